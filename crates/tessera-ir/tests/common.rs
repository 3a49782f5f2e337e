// Common helpers for tessera-ir integration tests

#![allow(dead_code)]

use tessera_ir::{
    CompressEncoding, CompressionEmitter, CompressionError, Constant, IrResult, MetaspaceObject, Stamp,
};

pub const OOP_ENCODING: CompressEncoding = CompressEncoding::new(0, 3);
pub const KLASS_ENCODING: CompressEncoding = CompressEncoding::new(0x8_0000_0000, 3);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn klass(name: &str) -> MetaspaceObject {
    MetaspaceObject::new(name)
}

/// A word-sized metadata pointer to the `index`-th class slot of `KLASS_ENCODING`.
pub fn klass_pointer(index: i64) -> i64 {
    KLASS_ENCODING.base as i64 + (index << KLASS_ENCODING.shift)
}

/// One request made to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Emitted {
    Parameter { index: u32 },
    Constant(Constant),
    Compress { input: usize, encoding: CompressEncoding, non_null: bool },
    Uncompress { input: usize, encoding: CompressEncoding, non_null: bool },
}

/// Records every backend request; values are indices into `emitted`.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    pub emitted: Vec<Emitted>,
}

impl RecordingEmitter {
    fn push(&mut self, emitted: Emitted) -> usize {
        self.emitted.push(emitted);
        self.emitted.len() - 1
    }

    pub fn compressions(&self) -> Vec<&Emitted> {
        self.emitted
            .iter()
            .filter(|e| matches!(e, Emitted::Compress { .. } | Emitted::Uncompress { .. }))
            .collect()
    }
}

impl CompressionEmitter for RecordingEmitter {
    type Value = usize;
    type Error = CompressionError;

    fn emit_parameter(&mut self, index: u32, _stamp: &Stamp) -> IrResult<usize> {
        Ok(self.push(Emitted::Parameter { index }))
    }

    fn emit_constant(&mut self, constant: &Constant, _stamp: &Stamp) -> IrResult<usize> {
        Ok(self.push(Emitted::Constant(constant.clone())))
    }

    fn emit_compress(&mut self, input: usize, encoding: &CompressEncoding, non_null: bool) -> usize {
        self.push(Emitted::Compress { input, encoding: *encoding, non_null })
    }

    fn emit_uncompress(&mut self, input: usize, encoding: &CompressEncoding, non_null: bool) -> usize {
        self.push(Emitted::Uncompress { input, encoding: *encoding, non_null })
    }
}
