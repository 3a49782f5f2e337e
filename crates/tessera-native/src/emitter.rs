// Translates compression requests into Cranelift instructions.

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{types, InstBuilder, Type, Value};
use cranelift_frontend::FunctionBuilder;
use tessera_ir::{CompressEncoding, CompressionEmitter, Constant, PointerWidth, Stamp};

use crate::NativeError;

/// Maps a stamp to the Cranelift type holding its values.
/// Returns `None` for stamps without a runtime representation.
pub fn translate_stamp(stamp: &Stamp, pointer_type: Type) -> Result<Option<Type>, NativeError> {
    match stamp {
        Stamp::Void => Ok(None),
        Stamp::Object(_) => Ok(Some(pointer_type)),
        Stamp::NarrowOop(_) => Ok(Some(types::I32)),
        Stamp::Integer(int) => int_type(int.bits).map(Some),
        Stamp::Float { bits: 32 } => Ok(Some(types::F32)),
        Stamp::Float { bits: 64 } => Ok(Some(types::F64)),
        Stamp::Float { bits } => Err(NativeError::TypeError(format!("unsupported float width {}", bits))),
    }
}

fn int_type(bits: u32) -> Result<Type, NativeError> {
    match bits {
        8 => Ok(types::I8),
        16 => Ok(types::I16),
        32 => Ok(types::I32),
        64 => Ok(types::I64),
        _ => Err(NativeError::TypeError(format!("unsupported integer width {}", bits))),
    }
}

/// Immediate for `iconst` of type `ty`: bits above the type width must be clear.
fn imm_for(ty: Type, value: i64) -> i64 {
    match ty.bits() {
        64 => value,
        bits => value & ((1i64 << bits) - 1),
    }
}

pub struct CraneliftEmitter<'b, 'f> {
    builder: &'b mut FunctionBuilder<'f>,
    /// Entry block parameters, indexed like the graph's parameters.
    params: Vec<Value>,
    pointer_type: Type,
}

impl<'b, 'f> CraneliftEmitter<'b, 'f> {
    pub fn new(builder: &'b mut FunctionBuilder<'f>, params: Vec<Value>, pointer_type: Type) -> Self {
        CraneliftEmitter { builder, params, pointer_type }
    }

    fn iconst(&mut self, ty: Type, value: i64) -> Value {
        self.builder.ins().iconst(ty, imm_for(ty, value))
    }
}

impl CompressionEmitter for CraneliftEmitter<'_, '_> {
    type Value = Value;
    type Error = NativeError;

    fn emit_parameter(&mut self, index: u32, stamp: &Stamp) -> Result<Value, NativeError> {
        let value = self.params.get(index as usize).copied().ok_or_else(|| {
            NativeError::TypeError(format!("no entry block parameter for parameter {}", index))
        })?;
        let expected = translate_stamp(stamp, self.pointer_type)?;
        let actual = self.builder.func.dfg.value_type(value);
        if expected != Some(actual) {
            return Err(NativeError::TypeError(format!(
                "Type mismatch for parameter {}: expected {:?}, got {:?}",
                index, expected, actual
            )));
        }
        Ok(value)
    }

    fn emit_constant(&mut self, constant: &Constant, _stamp: &Stamp) -> Result<Value, NativeError> {
        match constant {
            Constant::NullObject => Ok(self.iconst(self.pointer_type, 0)),
            Constant::CompressedNull => Ok(self.iconst(types::I32, 0)),
            Constant::Object(object) if !object.compressed => {
                Ok(self.iconst(self.pointer_type, object.handle.0 as i64))
            }
            Constant::Object(_) => Err(NativeError::Unimplemented(
                "narrow object constants need a heap base relocation".to_string(),
            )),
            Constant::Metaspace(meta) => match meta.width {
                PointerWidth::Word => Ok(self.iconst(types::I64, meta.raw)),
                PointerWidth::Narrow => Ok(self.iconst(types::I32, meta.raw)),
            },
            Constant::Int { bits, value } => {
                let ty = int_type(*bits)?;
                Ok(self.iconst(ty, *value))
            }
        }
    }

    fn emit_compress(&mut self, input: Value, encoding: &CompressEncoding, non_null: bool) -> Value {
        let mut offset = input;
        if !encoding.has_zero_base() {
            let base = self.iconst(types::I64, encoding.base as i64);
            offset = self.builder.ins().isub(offset, base);
        }
        if encoding.shift != 0 {
            offset = self.builder.ins().ushr_imm(offset, encoding.shift as i64);
        }
        let narrow = self.builder.ins().ireduce(types::I32, offset);
        if non_null || encoding.has_zero_base() {
            return narrow;
        }
        // null must stay null
        let is_null = self.builder.ins().icmp_imm(IntCC::Equal, input, 0);
        let zero = self.iconst(types::I32, 0);
        self.builder.ins().select(is_null, zero, narrow)
    }

    fn emit_uncompress(&mut self, input: Value, encoding: &CompressEncoding, non_null: bool) -> Value {
        let mut wide = self.builder.ins().uextend(types::I64, input);
        if encoding.shift != 0 {
            wide = self.builder.ins().ishl_imm(wide, encoding.shift as i64);
        }
        if encoding.has_zero_base() {
            return wide;
        }
        let base = self.iconst(types::I64, encoding.base as i64);
        wide = self.builder.ins().iadd(wide, base);
        if non_null {
            return wide;
        }
        let is_null = self.builder.ins().icmp_imm(IntCC::Equal, input, 0);
        let zero = self.iconst(types::I64, 0);
        self.builder.ins().select(is_null, zero, wide)
    }
}
