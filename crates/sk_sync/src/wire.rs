//! The canonical wire layout shared by the binary writer, reader and the
//! skip-unknown path.
//!
//! A field key is `(tag << 3) | category`, varint-encoded. Key `0` (tag 0 in
//! the `VarInt` category) is the end-of-child marker, which is why tag 0 can
//! never be declared by a field. Lists and dictionaries are dedicated
//! categories with their own info byte so an unknown field can always be
//! skipped structurally, without consulting any schema.

use crate::error::MalformedKind;

// -----------------------------------------------------------------------------
// WireCategory

/// The byte framing of a field, encoded in the low 3 bits of its key.
///
/// Category values are stable: a breaking format change requires a new
/// value, never the redefinition of an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireCategory {
    /// Unsigned LEB128; signed scalars are zigzag-folded first.
    VarInt = 0,
    /// Four little-endian bytes (`f32`).
    Fixed32 = 1,
    /// Eight little-endian bytes (`f64`).
    Fixed64 = 2,
    /// Varint byte length followed by that many bytes (UTF-8 for strings).
    Length = 3,
    /// Nested composite: fields, then the end marker. No polymorphism.
    Child = 4,
    /// [`Child`](Self::Child) preceded by a varint subtype tag
    /// (0 = the declared base type).
    ChildWithTag = 5,
    /// Info byte, varint count, then elements framed per their own category.
    List = 6,
    /// Info byte packing key/value categories, varint count, then pairs.
    Dict = 7,
}

impl WireCategory {
    /// The low-3-bit encoding of this category.
    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decodes a category from 3 bits. All 8 values are defined.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::VarInt,
            1 => Self::Fixed32,
            2 => Self::Fixed64,
            3 => Self::Length,
            4 => Self::Child,
            5 => Self::ChildWithTag,
            6 => Self::List,
            7 => Self::Dict,
            _ => unreachable!(),
        }
    }
}

// -----------------------------------------------------------------------------
// Key and info-byte helpers

/// End-of-child marker: tag 0, category `VarInt`.
pub(crate) const END_KEY: u64 = 0;

/// Number of bits the tag is shifted past the category.
pub(crate) const TAG_SHIFT: u32 = 3;

/// In a list info byte, marks per-element null flags.
pub(crate) const LIST_NULLABLE_BIT: u8 = 0x08;

/// Composes a field key from tag and category.
#[inline]
pub(crate) const fn field_key(tag: u16, category: WireCategory) -> u64 {
    ((tag as u64) << TAG_SHIFT) | category.bits() as u64
}

/// Splits a field key into `(tag, category)`.
#[inline]
pub(crate) const fn split_key(key: u64) -> (u64, WireCategory) {
    (key >> TAG_SHIFT, WireCategory::from_bits((key & 7) as u8))
}

/// Composes a list info byte.
#[inline]
pub(crate) const fn list_info(element: WireCategory, nullable: bool) -> u8 {
    element.bits() | if nullable { LIST_NULLABLE_BIT } else { 0 }
}

/// Splits a list info byte into `(element category, nullable)`.
pub(crate) fn split_list_info(info: u8) -> Result<(WireCategory, bool), MalformedKind> {
    if info & !(7 | LIST_NULLABLE_BIT) != 0 {
        return Err(MalformedKind::InvalidInfoByte);
    }
    Ok((
        WireCategory::from_bits(info & 7),
        info & LIST_NULLABLE_BIT != 0,
    ))
}

/// Composes a dictionary info byte: key category in the high nibble, value
/// category in the low nibble.
#[inline]
pub(crate) const fn dict_info(key: WireCategory, value: WireCategory) -> u8 {
    (key.bits() << 4) | value.bits()
}

/// Splits a dictionary info byte into `(key category, value category)`.
pub(crate) fn split_dict_info(info: u8) -> Result<(WireCategory, WireCategory), MalformedKind> {
    if info & 0x88 != 0 {
        return Err(MalformedKind::InvalidInfoByte);
    }
    Ok((
        WireCategory::from_bits(info >> 4),
        WireCategory::from_bits(info & 7),
    ))
}

// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        for tag in [1_u16, 7, 200, u16::MAX] {
            for cat in [
                WireCategory::VarInt,
                WireCategory::Length,
                WireCategory::Dict,
            ] {
                let (t, c) = split_key(field_key(tag, cat));
                assert_eq!((t, c), (tag as u64, cat));
            }
        }
    }

    #[test]
    fn end_marker_is_tag_zero() {
        assert_eq!(field_key(0, WireCategory::VarInt), END_KEY);
    }

    #[test]
    fn info_bytes_reject_reserved_bits() {
        assert!(split_list_info(0x10).is_err());
        assert!(split_dict_info(0x80).is_err());
        assert_eq!(
            split_list_info(list_info(WireCategory::Child, true)),
            Ok((WireCategory::Child, true))
        );
        assert_eq!(
            split_dict_info(dict_info(WireCategory::Length, WireCategory::VarInt)),
            Ok((WireCategory::Length, WireCategory::VarInt))
        );
    }
}
