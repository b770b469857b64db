//! Value codec: typed literals to fixed-size byte sequences and back.
//!
//! Integers are two's complement, floats IEEE-754 binary32/64 with the bit pattern
//! preserved, strings UTF-8 padded with NUL bytes. Arrays concatenate their elements in
//! declaration order.

use std::fmt;

use thiserror::Error;

use crate::model::{Endianness, Literal, ScalarType, TypeDecl};

/// Errors produced while encoding or decoding a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("value {value} out of range for {ty}")]
    OutOfRange { ty: ScalarType, value: String },
    #[error("expected {expected} literal, got {found}")]
    Mismatch {
        expected: &'static str,
        found: String,
    },
    #[error("array literal has {found} elements, type declares {expected}")]
    ArrayLength { expected: usize, found: usize },
    #[error("string of {len} bytes exceeds declared length {max}")]
    StringTooLong { len: usize, max: usize },
    #[error("expected {expected} bytes, got {found}")]
    ByteCount { expected: usize, found: usize },
    #[error("string data is not valid UTF-8")]
    InvalidUtf8,
}

/// Concrete occupied type of a parameter: the declared type with array and string
/// lengths fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Scalar(ScalarType),
    Array(ScalarType, usize),
    /// UTF-8 text occupying exactly this many bytes.
    Utf8(usize),
}

impl ValueType {
    /// Occupied size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        match *self {
            ValueType::Scalar(t) => t.size(),
            ValueType::Array(t, n) => t.size() * n,
            ValueType::Utf8(n) => n,
        }
    }

    /// Element type, `None` for strings.
    #[must_use]
    pub fn scalar(&self) -> Option<ScalarType> {
        match *self {
            ValueType::Scalar(t) | ValueType::Array(t, _) => Some(t),
            ValueType::Utf8(_) => None,
        }
    }

    /// Number of elements (bytes for strings).
    #[must_use]
    pub fn count(&self) -> usize {
        match *self {
            ValueType::Scalar(_) => 1,
            ValueType::Array(_, n) | ValueType::Utf8(n) => n,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar(t) => write!(f, "{}", t),
            ValueType::Array(t, n) => write!(f, "{}[{}]", t, n),
            ValueType::Utf8(n) => write!(f, "utf8[{}]", n),
        }
    }
}

/// Fix the occupied type of a parameter from its declaration and literal.
pub fn value_type(decl: &TypeDecl, literal: &Literal) -> Result<ValueType, CodecError> {
    match (*decl, literal) {
        (TypeDecl::Scalar(t), Literal::Array(items)) => {
            if items.is_empty() {
                return Err(CodecError::Mismatch {
                    expected: "non-empty array",
                    found: literal.to_string(),
                });
            }
            Ok(ValueType::Array(t, items.len()))
        }
        (TypeDecl::Scalar(t), _) => Ok(ValueType::Scalar(t)),
        (TypeDecl::Array(t, n), _) => Ok(ValueType::Array(t, n)),
        (TypeDecl::Utf8(Some(n)), _) => Ok(ValueType::Utf8(n)),
        (TypeDecl::Utf8(None), Literal::Str(s)) => Ok(ValueType::Utf8(s.len() + 1)),
        (TypeDecl::Utf8(None), other) => Err(CodecError::Mismatch {
            expected: "string",
            found: other.to_string(),
        }),
    }
}

/// Encode `literal` as `ty` in the given byte order.
pub fn encode(
    ty: &ValueType,
    literal: &Literal,
    endianness: Endianness,
) -> Result<Vec<u8>, CodecError> {
    match *ty {
        ValueType::Scalar(t) => encode_scalar(t, literal, endianness),
        ValueType::Array(t, n) => {
            let items = match literal {
                Literal::Array(items) => items,
                other => {
                    return Err(CodecError::Mismatch {
                        expected: "array",
                        found: other.to_string(),
                    })
                }
            };
            if items.len() != n {
                return Err(CodecError::ArrayLength {
                    expected: n,
                    found: items.len(),
                });
            }
            let mut out = Vec::with_capacity(ty.size());
            for item in items {
                out.extend(encode_scalar(t, item, endianness)?);
            }
            Ok(out)
        }
        ValueType::Utf8(n) => {
            let text = match literal {
                Literal::Str(s) => s,
                other => {
                    return Err(CodecError::Mismatch {
                        expected: "string",
                        found: other.to_string(),
                    })
                }
            };
            let bytes = text.as_bytes();
            if bytes.len() > n {
                return Err(CodecError::StringTooLong {
                    len: bytes.len(),
                    max: n,
                });
            }
            let mut out = bytes.to_vec();
            out.resize(n, 0);
            Ok(out)
        }
    }
}

/// Decode bytes previously produced by [`encode`].
pub fn decode(ty: &ValueType, bytes: &[u8], endianness: Endianness) -> Result<Literal, CodecError> {
    if bytes.len() != ty.size() {
        return Err(CodecError::ByteCount {
            expected: ty.size(),
            found: bytes.len(),
        });
    }
    match *ty {
        ValueType::Scalar(t) => Ok(decode_scalar(t, bytes, endianness)),
        ValueType::Array(t, _) => Ok(Literal::Array(
            bytes
                .chunks_exact(t.size())
                .map(|chunk| decode_scalar(t, chunk, endianness))
                .collect(),
        )),
        ValueType::Utf8(_) => {
            let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            let text = std::str::from_utf8(&bytes[..end]).map_err(|_| CodecError::InvalidUtf8)?;
            Ok(Literal::Str(text.to_string()))
        }
    }
}

/// Write the low `ty.size()` bytes of `bits` in the given order. Used for computed
/// checksum values.
#[must_use]
pub fn encode_bits(bits: u64, ty: ScalarType, endianness: Endianness) -> Vec<u8> {
    put_bits(bits, ty.size(), endianness)
}

/// Read an unsigned value of `bytes.len()` (at most 8) bytes.
#[must_use]
pub fn decode_bits(bytes: &[u8], endianness: Endianness) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    match endianness {
        Endianness::Little => buf[..n].copy_from_slice(&bytes[..n]),
        Endianness::Big => {
            for (i, b) in bytes[..n].iter().rev().enumerate() {
                buf[i] = *b;
            }
        }
    }
    u64::from_le_bytes(buf)
}

/// Parse an integer written in decimal or `0x` hexadecimal, with optional sign and `_`.
#[must_use]
pub fn parse_int(text: &str) -> Option<i128> {
    let cleaned: String = text.trim().chars().filter(|&c| c != '_').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i128::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i128>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn put_bits(bits: u64, size: usize, endianness: Endianness) -> Vec<u8> {
    let le = bits.to_le_bytes();
    let mut out = le[..size].to_vec();
    if endianness == Endianness::Big {
        out.reverse();
    }
    out
}

fn int_literal(ty: ScalarType, literal: &Literal) -> Result<i128, CodecError> {
    match literal {
        Literal::Int(v) => Ok(*v),
        Literal::Str(s) => parse_int(s).ok_or_else(|| CodecError::Mismatch {
            expected: "integer",
            found: literal.to_string(),
        }),
        Literal::Float(f) if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e38 => Ok(*f as i128),
        Literal::Float(_) => Err(CodecError::OutOfRange {
            ty,
            value: literal.to_string(),
        }),
        Literal::Array(_) => Err(CodecError::Mismatch {
            expected: "integer",
            found: literal.to_string(),
        }),
    }
}

fn float_literal(literal: &Literal) -> Result<f64, CodecError> {
    match literal {
        Literal::Float(f) => Ok(*f),
        Literal::Int(v) => Ok(*v as f64),
        Literal::Str(s) => s.trim().parse::<f64>().map_err(|_| CodecError::Mismatch {
            expected: "float",
            found: literal.to_string(),
        }),
        other => Err(CodecError::Mismatch {
            expected: "float",
            found: other.to_string(),
        }),
    }
}

fn encode_scalar(
    ty: ScalarType,
    literal: &Literal,
    endianness: Endianness,
) -> Result<Vec<u8>, CodecError> {
    if let Literal::Array(_) = literal {
        return Err(CodecError::Mismatch {
            expected: "scalar",
            found: literal.to_string(),
        });
    }

    let bits = match ty {
        ScalarType::F32 => {
            let value = float_literal(literal)?;
            let narrowed = value as f32;
            if value.is_finite() && narrowed.is_infinite() {
                return Err(CodecError::OutOfRange {
                    ty,
                    value: literal.to_string(),
                });
            }
            u64::from(narrowed.to_bits())
        }
        ScalarType::F64 => float_literal(literal)?.to_bits(),
        _ => {
            let value = int_literal(ty, literal)?;
            let bits = ty.bits();
            let (min, max) = if ty.is_signed() {
                (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
            } else {
                (0, (1i128 << bits) - 1)
            };
            if value < min || value > max {
                return Err(CodecError::OutOfRange {
                    ty,
                    value: literal.to_string(),
                });
            }
            value as u64
        }
    };
    Ok(put_bits(bits, ty.size(), endianness))
}

fn decode_scalar(ty: ScalarType, bytes: &[u8], endianness: Endianness) -> Literal {
    let raw = decode_bits(bytes, endianness);
    match ty {
        ScalarType::F32 => Literal::Float(f64::from(f32::from_bits(raw as u32))),
        ScalarType::F64 => Literal::Float(f64::from_bits(raw)),
        _ if ty.is_signed() => {
            let shift = 64 - ty.bits();
            Literal::Int(i128::from(((raw << shift) as i64) >> shift))
        }
        _ => Literal::Int(i128::from(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0x81"), Some(0x81));
        assert_eq!(parse_int("-127"), Some(-127));
        assert_eq!(parse_int("0xFFFF_FFFF"), Some(0xFFFF_FFFF));
        assert_eq!(parse_int("12a"), None);
    }

    #[test]
    fn test_decode_bits_orders() {
        assert_eq!(decode_bits(&[0x34, 0x12], Endianness::Little), 0x1234);
        assert_eq!(decode_bits(&[0x12, 0x34], Endianness::Big), 0x1234);
    }

    #[test]
    fn test_negative_int8() {
        let bytes = encode(
            &ValueType::Scalar(ScalarType::I8),
            &Literal::Int(-127),
            Endianness::Little,
        )
        .unwrap();
        assert_eq!(bytes, vec![0x81]);
    }
}
