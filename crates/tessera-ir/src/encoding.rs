//! The arithmetic of a pointer compression scheme.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Describes how a 64-bit address maps to a 32-bit narrow value.
///
/// `compress(p) = (p - base) >> shift` and `uncompress(v) = (zext(v) << shift) + base`.
/// The shift is logical, so narrow values are treated as unsigned offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompressEncoding {
    /// Address subtracted before shifting.
    pub base: u64,
    /// Alignment shift in bits.
    pub shift: u32,
}

impl CompressEncoding {
    /// Shifts at or above this width do not describe a 64-bit address space.
    pub const SHIFT_LIMIT: u32 = u64::BITS;

    pub const fn new(base: u64, shift: u32) -> Self {
        CompressEncoding { base, shift }
    }

    pub fn is_valid(&self) -> bool {
        self.shift < Self::SHIFT_LIMIT
    }

    /// Out-of-range shifts move every bit out, yielding zero.
    pub fn compress(&self, ptr: i64) -> i32 {
        let offset = (ptr as u64).wrapping_sub(self.base);
        offset.checked_shr(self.shift).unwrap_or(0) as u32 as i32
    }

    pub fn uncompress(&self, narrow: i32) -> i64 {
        let wide = (narrow as u32 as u64).checked_shl(self.shift).unwrap_or(0);
        wide.wrapping_add(self.base) as i64
    }

    /// True when the null address compresses to zero without a null check.
    pub fn has_zero_base(&self) -> bool {
        self.base == 0
    }
}

impl fmt::Display for CompressEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[base={:#x}, shift={}]", self.base, self.shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_based_encoding_is_a_plain_shift() {
        let encoding = CompressEncoding::new(0, 3);
        assert_eq!(encoding.compress(0x1000), 0x200);
        assert_eq!(encoding.uncompress(0x200), 0x1000);
    }

    #[test]
    fn narrow_values_are_unsigned() {
        let encoding = CompressEncoding::new(0x8_0000_0000, 3);
        let top = encoding.uncompress(-1);
        assert_eq!(top, 0x8_0000_0000 + (0xffff_ffffi64 << 3));
        assert_eq!(encoding.compress(top), -1);
    }

    #[test]
    fn oversized_shift_is_invalid_but_does_not_overflow() {
        let encoding = CompressEncoding::new(0, 64);
        assert!(!encoding.is_valid());
        assert!(CompressEncoding::new(0, 63).is_valid());
        assert_eq!(encoding.compress(0x1000), 0);
        assert_eq!(encoding.uncompress(1), 0);
    }

    #[test]
    fn display_names_base_and_shift() {
        assert_eq!(CompressEncoding::new(0x800, 3).to_string(), "[base=0x800, shift=3]");
    }
}
