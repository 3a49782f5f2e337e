//! # Stamps
//!
//! A [`Stamp`] is the compile-time over-approximation of the values a node may
//! produce. Compression only needs a small slice of a full lattice:
//!
//! *   [`ObjectStamp`]: an uncompressed managed reference with nullability facts.
//! *   [`NarrowOopStamp`]: a compressed reference. It carries the original
//!     object stamp and the encoding that produced it, so uncompressing restores
//!     every property of the reference.
//! *   [`IntegerStamp`]: an unsigned range over a fixed bit width. Metadata
//!     pointers are plain integers at this level.
//!
//! `Float` and `Void` exist so that other node kinds can be typed; they are
//! never valid compression inputs.

use std::fmt;
use std::sync::Arc;

use crate::encoding::CompressEncoding;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stamp {
    /// Produced by nodes with no value (e.g. returns).
    Void,
    Object(ObjectStamp),
    NarrowOop(NarrowOopStamp),
    Integer(IntegerStamp),
    Float { bits: u32 },
}

/// Nullability and type facts about an uncompressed reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectStamp {
    /// Declared type name, if known.
    pub ty: Option<Arc<str>>,
    pub non_null: bool,
    pub always_null: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NarrowOopStamp {
    pub object: ObjectStamp,
    pub encoding: CompressEncoding,
}

/// Inclusive unsigned range `[min, max]` over `bits` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegerStamp {
    pub bits: u32,
    pub min: u64,
    pub max: u64,
}

// --- Object stamps ---

impl ObjectStamp {
    /// A reference about which nothing is known.
    pub fn unrestricted() -> Self {
        ObjectStamp { ty: None, non_null: false, always_null: false }
    }

    pub fn non_null() -> Self {
        ObjectStamp { ty: None, non_null: true, always_null: false }
    }

    pub fn always_null() -> Self {
        ObjectStamp { ty: None, non_null: false, always_null: true }
    }

    pub fn with_type(mut self, ty: impl Into<Arc<str>>) -> Self {
        self.ty = Some(ty.into());
        self
    }
}

impl NarrowOopStamp {
    pub fn compressed(object: ObjectStamp, encoding: CompressEncoding) -> Self {
        NarrowOopStamp { object, encoding }
    }

    pub fn uncompressed(&self) -> Stamp {
        Stamp::Object(self.object.clone())
    }
}

// --- Integer stamps ---

impl IntegerStamp {
    /// The stamp covering every unsigned value representable in `bits` bits.
    pub fn unsigned_full(bits: u32) -> Self {
        assert!(bits > 0 && bits <= 64, "integer stamp width out of range: {}", bits);
        IntegerStamp { bits, min: 0, max: mask(bits) }
    }

    /// A stamp holding exactly one value.
    pub fn constant(bits: u32, value: u64) -> Self {
        let value = value & mask(bits);
        IntegerStamp { bits, min: value, max: value }
    }

    pub fn is_unsigned_full(&self) -> bool {
        self.min == 0 && self.max == mask(self.bits)
    }
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

// --- Helper Methods ---

impl Stamp {
    pub fn object(object: ObjectStamp) -> Self {
        Stamp::Object(object)
    }

    pub fn integer(bits: u32) -> Self {
        Stamp::Integer(IntegerStamp::unsigned_full(bits))
    }

    /// Whether the stamp describes a reference, compressed or not.
    pub fn is_object(&self) -> bool {
        matches!(self, Stamp::Object(_) | Stamp::NarrowOop(_))
    }

    /// Whether the stamp proves the reference is never null.
    pub fn is_object_non_null(&self) -> bool {
        match self {
            Stamp::Object(object) => object.non_null,
            Stamp::NarrowOop(narrow) => narrow.object.non_null,
            _ => false,
        }
    }

    pub fn integer_bits(&self) -> Option<u32> {
        match self {
            Stamp::Integer(int) => Some(int.bits),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object")?;
        if let Some(ty) = &self.ty {
            write!(f, "<{}>", ty)?;
        }
        if self.non_null {
            write!(f, " non-null")?;
        }
        if self.always_null {
            write!(f, " always-null")?;
        }
        Ok(())
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stamp::Void => write!(f, "void"),
            Stamp::Object(object) => write!(f, "{}", object),
            Stamp::NarrowOop(narrow) => write!(f, "narrow {} {}", narrow.object, narrow.encoding),
            Stamp::Integer(int) => write!(f, "i{} [{}, {}]", int.bits, int.min, int.max),
            Stamp::Float { bits } => write!(f, "f{}", bits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_ranges() {
        assert_eq!(IntegerStamp::unsigned_full(32).max, u32::MAX as u64);
        assert_eq!(IntegerStamp::unsigned_full(64).max, u64::MAX);
        assert!(IntegerStamp::unsigned_full(64).is_unsigned_full());
        assert!(!IntegerStamp::constant(64, 7).is_unsigned_full());
    }

    #[test]
    fn narrow_oop_keeps_object_facts() {
        let encoding = CompressEncoding::new(0, 3);
        let object = ObjectStamp::non_null().with_type("java.lang.String");
        let narrow = NarrowOopStamp::compressed(object.clone(), encoding);
        assert!(Stamp::NarrowOop(narrow.clone()).is_object_non_null());
        assert_eq!(narrow.uncompressed(), Stamp::Object(object));
    }

    #[test]
    fn non_null_only_for_references() {
        assert!(!Stamp::integer(64).is_object_non_null());
        assert!(!Stamp::object(ObjectStamp::unrestricted()).is_object_non_null());
        assert!(Stamp::object(ObjectStamp::non_null()).is_object_non_null());
    }

    #[test]
    fn display() {
        let encoding = CompressEncoding::new(0, 3);
        let narrow = Stamp::NarrowOop(NarrowOopStamp::compressed(ObjectStamp::non_null(), encoding));
        assert_eq!(narrow.to_string(), "narrow Object non-null [base=0x0, shift=3]");
        assert_eq!(Stamp::integer(32).to_string(), "i32 [0, 4294967295]");
        assert_eq!(
            Stamp::object(ObjectStamp::always_null().with_type("Foo")).to_string(),
            "Object<Foo> always-null"
        );
    }
}
