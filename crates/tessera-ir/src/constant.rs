//! Compile-time constants that can flow into compression nodes.

use std::fmt;
use std::sync::Arc;

/// Opaque handle naming a heap object known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u64);

/// A non-null object reference constant.
///
/// Compression of object constants does not depend on the encoding: the
/// constant only records whether it is in its narrow form. The encoding is
/// applied when the constant is materialized in machine code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectConstant {
    pub handle: ObjectHandle,
    pub compressed: bool,
}

impl ObjectConstant {
    pub fn new(handle: ObjectHandle) -> Self {
        ObjectConstant { handle, compressed: false }
    }

    pub fn compress(&self) -> Self {
        debug_assert!(!self.compressed, "object constant is already compressed");
        ObjectConstant { handle: self.handle, compressed: true }
    }

    pub fn uncompress(&self) -> Self {
        debug_assert!(self.compressed, "object constant is not compressed");
        ObjectConstant { handle: self.handle, compressed: false }
    }
}

/// The metadata object (class, method, ...) a metadata pointer names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaspaceObject(pub Arc<str>);

impl MetaspaceObject {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        MetaspaceObject(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Width of a metadata pointer constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerWidth {
    /// Full 64-bit address.
    Word,
    /// 32-bit compressed form.
    Narrow,
}

impl PointerWidth {
    pub fn bits(self) -> u32 {
        match self {
            PointerWidth::Word => 64,
            PointerWidth::Narrow => 32,
        }
    }
}

/// A metadata pointer with its raw payload and the object it names.
///
/// For `Narrow` constants `raw` holds the sign-extended 32-bit payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaspaceConstant {
    pub width: PointerWidth,
    pub raw: i64,
    pub object: MetaspaceObject,
}

impl MetaspaceConstant {
    pub fn word(raw: i64, object: MetaspaceObject) -> Self {
        MetaspaceConstant { width: PointerWidth::Word, raw, object }
    }

    pub fn narrow(raw: i32, object: MetaspaceObject) -> Self {
        MetaspaceConstant { width: PointerWidth::Narrow, raw: raw as i64, object }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// The uncompressed null reference.
    NullObject,
    /// The null reference in narrow form.
    CompressedNull,
    Object(ObjectConstant),
    Metaspace(MetaspaceConstant),
    /// A primitive integer. Never a valid compression input.
    Int { bits: u32, value: i64 },
}

impl Constant {
    pub fn object(handle: u64) -> Self {
        Constant::Object(ObjectConstant::new(ObjectHandle(handle)))
    }

    pub fn metaspace(raw: i64, object: MetaspaceObject) -> Self {
        Constant::Metaspace(MetaspaceConstant::word(raw, object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Constant::NullObject | Constant::CompressedNull)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::NullObject => write!(f, "null"),
            Constant::CompressedNull => write!(f, "compressed null"),
            Constant::Object(object) => {
                write!(f, "Object[{:#x}]", object.handle.0)?;
                if object.compressed {
                    write!(f, " (narrow)")?;
                }
                Ok(())
            }
            Constant::Metaspace(meta) => write!(
                f,
                "Metaspace[{} = {:#x} : i{}]",
                meta.object.name(),
                meta.raw,
                meta.width.bits()
            ),
            Constant::Int { bits, value } => write!(f, "i{} {}", bits, value),
        }
    }
}
