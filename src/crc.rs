//! Width-parameterized CRC engine (Rocksoft model, bit-serial) and the access/swap
//! byte source that feeds it from a memory range.

use crate::format::{CRC32_INIT, CRC32_POLY};

/// CRC algorithm parameters. The width comes from the checksum element's integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcConfig {
    /// Generator polynomial in normal (MSB-first) form, without the implicit top bit.
    pub polynomial: u64,
    pub init: u64,
    pub reflect_in: bool,
    pub reflect_out: bool,
    /// XOR the result with all ones of the CRC width.
    pub final_xor: bool,
}

impl Default for CrcConfig {
    /// CRC-32/IEEE-802.3.
    fn default() -> Self {
        Self {
            polynomial: CRC32_POLY,
            init: CRC32_INIT,
            reflect_in: true,
            reflect_out: true,
            final_xor: true,
        }
    }
}

/// Read widths accepted for checksum ranges.
pub const ACCESS_WIDTHS: [u32; 4] = [8, 16, 32, 64];

/// A configured CRC calculator of a given width.
#[derive(Debug, Clone, Copy)]
pub struct Crc {
    width: u32,
    config: CrcConfig,
}

impl Crc {
    /// `width` must be 8, 16, 32 or 64; `polynomial` and `init` must fit in it.
    pub fn new(width: u32, config: CrcConfig) -> Result<Self, String> {
        if !ACCESS_WIDTHS.contains(&width) {
            return Err(format!("unsupported CRC width {}", width));
        }
        let mask = mask(width);
        if config.polynomial & !mask != 0 {
            return Err(format!(
                "polynomial 0x{:X} does not fit {} bits",
                config.polynomial, width
            ));
        }
        if config.init & !mask != 0 {
            return Err(format!("init 0x{:X} does not fit {} bits", config.init, width));
        }
        Ok(Self { width, config })
    }

    /// CRC-32/IEEE-802.3.
    #[must_use]
    pub fn crc32() -> Self {
        Self {
            width: 32,
            config: CrcConfig::default(),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Compute the checksum over `bytes` in iteration order.
    pub fn checksum<I: IntoIterator<Item = u8>>(&self, bytes: I) -> u64 {
        let mask = mask(self.width);
        let top = 1u64 << (self.width - 1);
        let mut reg = self.config.init & mask;

        for byte in bytes {
            let byte = if self.config.reflect_in {
                byte.reverse_bits()
            } else {
                byte
            };
            reg ^= u64::from(byte) << (self.width - 8);
            for _ in 0..8 {
                reg = if reg & top != 0 {
                    ((reg << 1) ^ self.config.polynomial) & mask
                } else {
                    (reg << 1) & mask
                };
            }
        }

        if self.config.reflect_out {
            reg = reflect(reg, self.width);
        }
        if self.config.final_xor {
            reg ^= mask;
        }
        reg & mask
    }
}

fn mask(width: u32) -> u64 {
    if width == 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Reverse the low `width` bits of `value`.
fn reflect(value: u64, width: u32) -> u64 {
    value.reverse_bits() >> (64 - width)
}

/// Reorder a memory range for checksumming.
///
/// With `swap` set and `access > 8`, every `access / 8`-byte chunk (counted from the start
/// of `data`) is reversed, so storage bytes are read as big-endian words. Otherwise the
/// data passes through unchanged. The caller validates `access` and the chunk alignment.
#[must_use]
pub fn prepare(data: &[u8], access: u32, swap: bool) -> Vec<u8> {
    if !swap || access <= 8 {
        return data.to_vec();
    }
    let chunk = (access / 8) as usize;
    let mut out = Vec::with_capacity(data.len());
    for word in data.chunks(chunk) {
        out.extend(word.iter().rev());
    }
    out
}
