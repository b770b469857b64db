//! Intel-hex reader: parses a hex file back into a [`MemoryImage`] for verification.
//!
//! Every record checksum is validated. Start-address records are kept but not interpreted.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use crate::image::MemoryImage;
use crate::writers::ihex::{
    RECORD_DATA, RECORD_EOF, RECORD_EXT_LINEAR, RECORD_EXT_SEGMENT, RECORD_START_LINEAR,
    RECORD_START_SEGMENT,
};

/// Errors produced by the hex reader. Line numbers start at 1.
#[derive(Debug, Error)]
pub enum HexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {0}: record does not start with ':'")]
    MissingColon(usize),
    #[error("line {0}: invalid hex digits")]
    InvalidHex(usize),
    #[error("line {line}: record length {declared} does not match {actual} data bytes")]
    Length {
        line: usize,
        declared: usize,
        actual: usize,
    },
    #[error("line {line}: checksum 0x{found:02X}, expected 0x{expected:02X}")]
    Checksum { line: usize, expected: u8, found: u8 },
    #[error("line {line}: unsupported record type 0x{kind:02X}")]
    UnsupportedRecord { line: usize, kind: u8 },
    #[error("line {line}: {len} data bytes at 0x{address:X} run past the 32-bit address space")]
    AddressOverflow {
        line: usize,
        address: u32,
        len: usize,
    },
    #[error("line {0}: data after end-of-file record")]
    DataAfterEof(usize),
    #[error("missing end-of-file record")]
    MissingEof,
}

/// Hex file contents: image plus the optional start address.
#[derive(Debug, Clone, Default)]
pub struct HexImageReader {
    pub image: MemoryImage,
    /// Value of a type-03 or type-05 record, if present.
    pub start_address: Option<u32>,
    /// Number of data records read.
    pub data_records: usize,
}

impl HexImageReader {
    /// Open and parse a hex file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HexError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse hex records from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, HexError> {
        let mut result = HexImageReader::default();
        let mut base: u32 = 0;
        let mut eof = false;

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if eof {
                return Err(HexError::DataAfterEof(line_no));
            }

            let record = parse_record(line, line_no)?;
            match record.kind {
                RECORD_DATA => {
                    let address = base.wrapping_add(u32::from(record.address));
                    if !result.image.extend(address, &record.data) {
                        return Err(HexError::AddressOverflow {
                            line: line_no,
                            address,
                            len: record.data.len(),
                        });
                    }
                    result.data_records += 1;
                }
                RECORD_EOF => eof = true,
                RECORD_EXT_SEGMENT => base = u32::from(record.word(line_no)?) << 4,
                RECORD_EXT_LINEAR => base = u32::from(record.word(line_no)?) << 16,
                RECORD_START_SEGMENT | RECORD_START_LINEAR => {
                    if record.data.len() != 4 {
                        return Err(HexError::Length {
                            line: line_no,
                            declared: 4,
                            actual: record.data.len(),
                        });
                    }
                    let mut buf = [0u8; 4];
                    buf.copy_from_slice(&record.data);
                    result.start_address = Some(u32::from_be_bytes(buf));
                }
                kind => return Err(HexError::UnsupportedRecord { line: line_no, kind }),
            }
        }

        if !eof {
            return Err(HexError::MissingEof);
        }
        Ok(result)
    }
}

struct Record {
    address: u16,
    kind: u8,
    data: Vec<u8>,
}

impl Record {
    /// Payload of an address record: one big-endian word.
    fn word(&self, line: usize) -> Result<u16, HexError> {
        match self.data.as_slice() {
            [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
            other => Err(HexError::Length {
                line,
                declared: 2,
                actual: other.len(),
            }),
        }
    }
}

fn parse_record(line: &str, line_no: usize) -> Result<Record, HexError> {
    let digits = line.strip_prefix(':').ok_or(HexError::MissingColon(line_no))?;
    if digits.len() % 2 != 0 || digits.len() < 10 || !digits.is_ascii() {
        return Err(HexError::InvalidHex(line_no));
    }
    let bytes = (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| HexError::InvalidHex(line_no))?;

    // length, address (2), type, data..., checksum
    let declared = usize::from(bytes[0]);
    let actual = bytes.len() - 5;
    if declared != actual {
        return Err(HexError::Length {
            line: line_no,
            declared,
            actual,
        });
    }

    let (body, checksum) = bytes.split_at(bytes.len() - 1);
    let sum = body.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    let expected = sum.wrapping_neg();
    if checksum[0] != expected {
        return Err(HexError::Checksum {
            line: line_no,
            expected,
            found: checksum[0],
        });
    }

    Ok(Record {
        address: u16::from_be_bytes([bytes[1], bytes[2]]),
        kind: bytes[3],
        data: body[4..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_record() {
        let record = parse_record(":0300300002337A1E", 1).unwrap();
        assert_eq!(record.address, 0x0030);
        assert_eq!(record.kind, RECORD_DATA);
        assert_eq!(record.data, vec![0x02, 0x33, 0x7A]);
    }

    #[test]
    fn test_record_past_address_space() {
        let text = ":02000004FFFFFC\n:10FFF800000102030405060708090A0B0C0D0E0F81\n:00000001FF\n";
        match HexImageReader::from_reader(text.as_bytes()) {
            Err(HexError::AddressOverflow { line, address, len }) => {
                assert_eq!((line, address, len), (2, 0xFFFF_FFF8, 16));
            }
            other => panic!("expected address overflow, got {:?}", other.map(|r| r.data_records)),
        }
    }

    #[test]
    fn test_bad_checksum() {
        match parse_record(":0300300002337A1F", 7) {
            Err(HexError::Checksum { line, .. }) => assert_eq!(line, 7),
            other => panic!("expected checksum error, got {:?}", other.map(|r| r.kind)),
        }
    }
}
