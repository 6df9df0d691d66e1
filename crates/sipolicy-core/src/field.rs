//! Field descriptors for config block payloads
//!
//! Policy structs use explicit little-endian containers instead of compiler
//! bit-fields. A [`Field`] documents where one policy knob lives:
//!
//! ```text
//! block[offset .. offset + width]   little-endian container
//! (container >> shift) & mask(bits) field value
//! ```
//!
//! Typed accessors on the block structs use [`extract`] and [`insert`] with
//! the same shift/width constants, so the descriptor tables and the typed
//! API cannot drift apart.

use crate::error::{Error, Result};

/// Extract `bits` bits starting at `shift` from a container value
///
/// A `shift` past the container yields 0.
pub const fn extract(value: u32, shift: u8, bits: u8) -> u32 {
    match value.checked_shr(shift as u32) {
        Some(v) => v & mask32(bits),
        None => 0,
    }
}

/// Replace `bits` bits starting at `shift` in a container value
///
/// Bits of `field` above `bits` are dropped.
pub const fn insert(value: u32, shift: u8, bits: u8, field: u32) -> u32 {
    let (mask, field) = match (
        mask32(bits).checked_shl(shift as u32),
        field.checked_shl(shift as u32),
    ) {
        (Some(mask), Some(field)) => (mask, field),
        _ => return value,
    };
    (value & !mask) | (field & mask)
}

const fn mask32(bits: u8) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// Location and width of one policy knob inside a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name, unique within its block
    pub name: &'static str,
    /// Byte offset of the container from the start of the block
    pub offset: usize,
    /// Container width in bytes (1, 2 or 4)
    pub width: u8,
    /// Bit position of the field within the container
    pub shift: u8,
    /// Field width in bits
    pub bits: u8,
    /// One-line description
    pub help: &'static str,
}

impl Field {
    /// Whole-byte field
    pub const fn u8(name: &'static str, offset: usize, help: &'static str) -> Self {
        Self::bits(name, offset, 1, 0, 8, help)
    }

    /// Whole 16-bit field
    pub const fn u16(name: &'static str, offset: usize, help: &'static str) -> Self {
        Self::bits(name, offset, 2, 0, 16, help)
    }

    /// Whole 32-bit field
    pub const fn u32(name: &'static str, offset: usize, help: &'static str) -> Self {
        Self::bits(name, offset, 4, 0, 32, help)
    }

    /// Single-bit flag in a `width`-byte container
    pub const fn flag(
        name: &'static str,
        offset: usize,
        width: u8,
        bit: u8,
        help: &'static str,
    ) -> Self {
        Self::bits(name, offset, width, bit, 1, help)
    }

    /// `bits`-wide field at `shift` in a `width`-byte container
    ///
    /// Panics (at compile time in const tables) unless the field fits in a
    /// container of 1 to 4 bytes.
    pub const fn bits(
        name: &'static str,
        offset: usize,
        width: u8,
        shift: u8,
        bits: u8,
        help: &'static str,
    ) -> Self {
        assert!(width >= 1 && width <= 4, "field container must be 1 to 4 bytes");
        assert!(bits >= 1, "field must be at least one bit wide");
        assert!(
            shift as u32 + bits as u32 <= width as u32 * 8,
            "field does not fit its container"
        );
        Self {
            name,
            offset,
            width,
            shift,
            bits,
            help,
        }
    }

    /// Largest value the field can hold
    pub fn max_value(&self) -> u64 {
        mask32(self.bits) as u64
    }

    /// Read the field from a complete block
    ///
    /// Returns `None` if the block is too small to contain the field.
    pub fn read(&self, block: &[u8]) -> Option<u64> {
        let container = self.load(block)?;
        Some(extract(container, self.shift, self.bits) as u64)
    }

    /// Write the field into a complete block
    pub fn write(&self, block: &mut [u8], value: u64) -> Result<()> {
        if value > self.max_value() {
            return Err(Error::ValueOutOfRange);
        }
        let container = self.load(block).ok_or(Error::SizeMismatch {
            found: block.len() as u32,
            required: (self.offset + self.width as usize) as u32,
        })?;
        let updated = insert(container, self.shift, self.bits, value as u32);
        let width = self.width as usize;
        block[self.offset..self.offset + width].copy_from_slice(&updated.to_le_bytes()[..width]);
        Ok(())
    }

    fn load(&self, block: &[u8]) -> Option<u32> {
        let width = self.width as usize;
        if width > 4 {
            return None;
        }
        let bytes = block.get(self.offset..self.offset + width)?;
        let mut raw = [0u8; 4];
        raw[..width].copy_from_slice(bytes);
        Some(u32::from_le_bytes(raw))
    }
}

/// Find a field by name (case-insensitive)
pub fn find_field<'a>(fields: &'a [Field], name: &str) -> Option<&'a Field> {
    fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_insert() {
        assert_eq!(extract(0b1011_0000, 4, 4), 0b1011);
        assert_eq!(insert(0xFFFF_FFFF, 4, 4, 0), 0xFFFF_FF0F);
        assert_eq!(insert(0, 31, 1, 1), 0x8000_0000);
        // Excess bits of the new value are dropped
        assert_eq!(insert(0, 0, 2, 0xFF), 0b11);
        assert_eq!(extract(0x1234_5678, 0, 32), 0x1234_5678);
    }

    #[test]
    fn test_read_write_bits() {
        let field = Field::bits("ratio", 2, 2, 3, 5, "");
        let mut block = [0u8; 4];
        field.write(&mut block, 0x1F).unwrap();
        assert_eq!(u16::from_le_bytes([block[2], block[3]]), 0x1F << 3);
        assert_eq!(field.read(&block), Some(0x1F));
        assert_eq!(field.write(&mut block, 0x20), Err(Error::ValueOutOfRange));
    }

    #[test]
    fn test_write_preserves_neighbours() {
        let low = Field::flag("low", 0, 1, 0, "");
        let high = Field::bits("high", 0, 1, 4, 4, "");
        let mut block = [0u8; 1];
        low.write(&mut block, 1).unwrap();
        high.write(&mut block, 0xA).unwrap();
        assert_eq!(block[0], 0xA1);
        low.write(&mut block, 0).unwrap();
        assert_eq!(block[0], 0xA0);
    }

    #[test]
    fn test_out_of_bounds() {
        let field = Field::u32("wide", 2, "");
        let mut block = [0u8; 4];
        assert_eq!(field.read(&block), None);
        assert_eq!(
            field.write(&mut block, 1),
            Err(Error::SizeMismatch {
                found: 4,
                required: 6
            })
        );
    }

    #[test]
    fn test_shift_past_container() {
        assert_eq!(extract(u32::MAX, 32, 4), 0);
        assert_eq!(insert(0x55, 40, 4, 0xF), 0x55);
    }

    #[test]
    #[should_panic(expected = "1 to 4 bytes")]
    fn test_wide_container_rejected() {
        Field::bits("wide", 0, 8, 0, 8, "");
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_field_past_container_rejected() {
        Field::bits("high", 0, 1, 6, 4, "");
    }

    #[test]
    fn test_hand_built_descriptor() {
        let field = Field {
            width: 8,
            ..Field::u8("raw", 0, "")
        };
        let mut block = [0u8; 16];
        assert_eq!(field.read(&block), None);
        assert!(field.write(&mut block, 1).is_err());
    }

    #[test]
    fn test_find_field() {
        let fields = [Field::u8("PortCount", 0, ""), Field::u8("mode", 1, "")];
        assert_eq!(find_field(&fields, "portcount").unwrap().offset, 0);
        assert!(find_field(&fields, "missing").is_none());
    }
}
