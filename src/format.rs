//! Fixed layout constants and the block header record.
//!
//! Defines the 16-byte header that may open a parameter block, the alignment limits
//! and the default CRC parameter set (CRC-32/IEEE-802.3).

use crate::model::Endianness;

/// Size of the optional block header in bytes.
pub const HEADER_LEN: u32 = 16;

/// Largest alignment accepted for blocks and elements.
pub const MAX_ALIGN: u32 = 16384;

/// Default CRC polynomial (IEEE 802.3, normal form).
pub const CRC32_POLY: u64 = 0x04C1_1DB7;

/// Default CRC seed.
pub const CRC32_INIT: u64 = 0xFFFF_FFFF;

/// CRC-32/IEEE result for the ASCII string "123456789".
pub const CRC32_CHECK: u64 = 0xCBF4_3926;

/// Symbol suffix used for block headers in serialized symbol names.
pub const HEADER_SUFFIX: &str = "blkhdr";

/// Identification record at the start of a block.
///
/// Serialized as `id:u16, major:u16, minor:u16, dataver:u16, reserved:u32 = 0, length:u32`
/// in the block's byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block identifier.
    pub id: u16,
    pub major: u16,
    pub minor: u16,
    /// Data version (called `version` in manifests).
    pub dataver: u16,
}

impl BlockHeader {
    /// Encode the header for a block of `length` bytes.
    #[must_use]
    pub fn to_bytes(&self, length: u32, endianness: Endianness) -> [u8; HEADER_LEN as usize] {
        let mut out = [0u8; HEADER_LEN as usize];
        let words = [self.id, self.major, self.minor, self.dataver];
        for (i, word) in words.iter().enumerate() {
            let bytes = match endianness {
                Endianness::Little => word.to_le_bytes(),
                Endianness::Big => word.to_be_bytes(),
            };
            out[i * 2..i * 2 + 2].copy_from_slice(&bytes);
        }
        // bytes 8..12 stay zero (reserved)
        let len = match endianness {
            Endianness::Little => length.to_le_bytes(),
            Endianness::Big => length.to_be_bytes(),
        };
        out[12..16].copy_from_slice(&len);
        out
    }
}

/// True when `align` is a power of two within `1..=MAX_ALIGN`.
#[must_use]
pub fn is_valid_alignment(align: u32) -> bool {
    align.is_power_of_two() && align <= MAX_ALIGN
}
