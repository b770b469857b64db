//! Value codec tests: integer and float round trips, range errors, arrays and strings.

use flashblock::codec::{decode, encode, value_type, CodecError, ValueType};
use flashblock::{Endianness, Literal, ScalarType, TypeDecl};

const ORDERS: [Endianness; 2] = [Endianness::Little, Endianness::Big];

fn round_trip(ty: ScalarType, value: i128) {
    let vt = ValueType::Scalar(ty);
    for order in ORDERS {
        let bytes = encode(&vt, &Literal::Int(value), order).unwrap();
        assert_eq!(bytes.len(), ty.size());
        assert_eq!(decode(&vt, &bytes, order).unwrap(), Literal::Int(value), "{} {}", ty, value);
    }
}

/// Every value of the 8- and 16-bit types survives encode/decode.
#[test]
fn small_integers_round_trip_exhaustively() {
    for v in i128::from(i8::MIN)..=i128::from(i8::MAX) {
        round_trip(ScalarType::I8, v);
    }
    for v in 0..=i128::from(u8::MAX) {
        round_trip(ScalarType::U8, v);
    }
    for v in i128::from(i16::MIN)..=i128::from(i16::MAX) {
        round_trip(ScalarType::I16, v);
    }
    for v in 0..=i128::from(u16::MAX) {
        round_trip(ScalarType::U16, v);
    }
}

/// Limits and a few interior values of the 32- and 64-bit types.
#[test]
fn wide_integers_round_trip_at_limits() {
    for v in [i128::from(i32::MIN), -1, 0, 1, 0x1234_5678, i128::from(i32::MAX)] {
        round_trip(ScalarType::I32, v);
    }
    for v in [0, 1, 0xDEAD_BEEF, i128::from(u32::MAX)] {
        round_trip(ScalarType::U32, v);
    }
    for v in [i128::from(i64::MIN), -2, 0, i128::from(i64::MAX)] {
        round_trip(ScalarType::I64, v);
    }
    for v in [0, 0x0123_4567_89AB_CDEF, i128::from(u64::MAX)] {
        round_trip(ScalarType::U64, v);
    }
}

/// One past either end of the range is rejected.
#[test]
fn integers_out_of_range_fail() {
    let cases = [
        (ScalarType::U8, 256),
        (ScalarType::U8, -1),
        (ScalarType::I8, 128),
        (ScalarType::I8, -129),
        (ScalarType::U16, 0x1_0000),
        (ScalarType::I16, -32769),
        (ScalarType::U32, 0x1_0000_0000),
        (ScalarType::I32, i128::from(i32::MAX) + 1),
        (ScalarType::U64, i128::from(u64::MAX) + 1),
        (ScalarType::I64, i128::from(i64::MIN) - 1),
    ];
    for (ty, value) in cases {
        match encode(&ValueType::Scalar(ty), &Literal::Int(value), Endianness::Little) {
            Err(CodecError::OutOfRange { ty: got, .. }) => assert_eq!(got, ty),
            other => panic!("expected out of range for {} {}, got {:?}", ty, value, other),
        }
    }
}

/// Byte order is applied per element.
#[test]
fn integer_byte_order() {
    let vt = ValueType::Scalar(ScalarType::U32);
    let le = encode(&vt, &Literal::Int(0x1122_3344), Endianness::Little).unwrap();
    let be = encode(&vt, &Literal::Int(0x1122_3344), Endianness::Big).unwrap();
    assert_eq!(le, vec![0x44, 0x33, 0x22, 0x11]);
    assert_eq!(be, vec![0x11, 0x22, 0x33, 0x44]);
}

/// Integer literals given as hex strings are accepted.
#[test]
fn integer_from_hex_string() {
    let vt = ValueType::Scalar(ScalarType::U16);
    let bytes = encode(&vt, &Literal::Str("0xBEEF".into()), Endianness::Big).unwrap();
    assert_eq!(bytes, vec![0xBE, 0xEF]);
}

/// A fractional literal for an integer type is a range error.
#[test]
fn fractional_literal_for_integer_fails() {
    let err = encode(
        &ValueType::Scalar(ScalarType::I32),
        &Literal::Float(1.5),
        Endianness::Little,
    )
    .unwrap_err();
    assert!(matches!(err, CodecError::OutOfRange { .. }));
}

/// Float bit patterns survive, including negative zero and subnormals.
#[test]
fn floats_preserve_bit_patterns() {
    let f32_values = [
        0.0f32,
        -0.0,
        1.0,
        -2.1,
        f32::MIN_POSITIVE,
        f32::from_bits(1),
        -f32::from_bits(0x0000_0FFF),
        f32::MAX,
        f32::MIN,
    ];
    let vt = ValueType::Scalar(ScalarType::F32);
    for v in f32_values {
        for order in ORDERS {
            let bytes = encode(&vt, &Literal::Float(f64::from(v)), order).unwrap();
            let raw = match order {
                Endianness::Little => v.to_bits().to_le_bytes(),
                Endianness::Big => v.to_bits().to_be_bytes(),
            };
            assert_eq!(bytes, raw.to_vec());
            match decode(&vt, &bytes, order).unwrap() {
                Literal::Float(back) => assert_eq!((back as f32).to_bits(), v.to_bits()),
                other => panic!("expected float, got {:?}", other),
            }
        }
    }

    let f64_values = [-0.0f64, 1.0e-300, -f64::from_bits(1), f64::MAX];
    let vt = ValueType::Scalar(ScalarType::F64);
    for v in f64_values {
        for order in ORDERS {
            let bytes = encode(&vt, &Literal::Float(v), order).unwrap();
            match decode(&vt, &bytes, order).unwrap() {
                Literal::Float(back) => assert_eq!(back.to_bits(), v.to_bits()),
                other => panic!("expected float, got {:?}", other),
            }
        }
    }
}

/// A finite value too large for binary32 is rejected instead of becoming infinity.
#[test]
fn float32_overflow_fails() {
    let err = encode(
        &ValueType::Scalar(ScalarType::F32),
        &Literal::Float(1e39),
        Endianness::Little,
    )
    .unwrap_err();
    assert!(matches!(err, CodecError::OutOfRange { .. }));
}

/// Arrays concatenate elements; the declared length must match.
#[test]
fn arrays_concatenate_and_check_length() {
    let decl: TypeDecl = "uint16[3]".parse().unwrap();
    let lit = Literal::Array(vec![Literal::Int(1), Literal::Int(2), Literal::Int(0x0304)]);
    let vt = value_type(&decl, &lit).unwrap();
    assert_eq!(vt.size(), 6);
    let bytes = encode(&vt, &lit, Endianness::Little).unwrap();
    assert_eq!(bytes, vec![1, 0, 2, 0, 4, 3]);

    let short = Literal::Array(vec![Literal::Int(1)]);
    let err = encode(&vt, &short, Endianness::Little).unwrap_err();
    assert_eq!(
        err,
        CodecError::ArrayLength {
            expected: 3,
            found: 1
        }
    );
}

/// A scalar type given an array literal is sized by the literal.
#[test]
fn scalar_declaration_with_array_literal() {
    let decl: TypeDecl = "float32".parse().unwrap();
    let lit = Literal::Array(vec![Literal::Float(1.0), Literal::Float(2.0)]);
    assert_eq!(
        value_type(&decl, &lit).unwrap(),
        ValueType::Array(ScalarType::F32, 2)
    );
}

/// Strings: unsized gets a NUL terminator, sized is NUL-padded, too long fails.
#[test]
fn strings_are_sized_and_padded() {
    let lit = Literal::Str("abc".into());

    let unsized_ty = value_type(&TypeDecl::Utf8(None), &lit).unwrap();
    assert_eq!(unsized_ty, ValueType::Utf8(4));
    assert_eq!(
        encode(&unsized_ty, &lit, Endianness::Little).unwrap(),
        b"abc\0".to_vec()
    );

    let sized = ValueType::Utf8(6);
    let bytes = encode(&sized, &lit, Endianness::Big).unwrap();
    assert_eq!(bytes, b"abc\0\0\0".to_vec());
    assert_eq!(decode(&sized, &bytes, Endianness::Big).unwrap(), lit);

    let err = encode(&ValueType::Utf8(2), &lit, Endianness::Little).unwrap_err();
    assert_eq!(err, CodecError::StringTooLong { len: 3, max: 2 });
}

/// Type names parse, including arrays and sized strings.
#[test]
fn type_declarations_parse() {
    assert_eq!(
        "int64".parse::<TypeDecl>().unwrap(),
        TypeDecl::Scalar(ScalarType::I64)
    );
    assert_eq!(
        "float64[4]".parse::<TypeDecl>().unwrap(),
        TypeDecl::Array(ScalarType::F64, 4)
    );
    assert_eq!("utf8[16]".parse::<TypeDecl>().unwrap(), TypeDecl::Utf8(Some(16)));
    assert!("uint24".parse::<TypeDecl>().is_err());
    assert!("uint8[0]".parse::<TypeDecl>().is_err());
}
