//! CRC engine tests: catalog check values and the access/swap byte source.

use flashblock::crc::{prepare, Crc, CrcConfig};
use flashblock::format::CRC32_CHECK;

const CHECK: &[u8] = b"123456789";

fn check(width: u32, config: CrcConfig) -> u64 {
    Crc::new(width, config).unwrap().checksum(CHECK.iter().copied())
}

#[test]
fn crc32_ieee_check_value() {
    assert_eq!(check(32, CrcConfig::default()), CRC32_CHECK);
    assert_eq!(Crc::crc32().checksum(CHECK.iter().copied()), CRC32_CHECK);
    assert_eq!(Crc::crc32().width(), 32);
}

#[test]
fn crc8_check_value() {
    let config = CrcConfig {
        polynomial: 0x07,
        init: 0,
        reflect_in: false,
        reflect_out: false,
        final_xor: false,
    };
    assert_eq!(check(8, config), 0xF4);
}

/// CRC-16/ARC and CRC-16/CCITT-FALSE.
#[test]
fn crc16_check_values() {
    let arc = CrcConfig {
        polynomial: 0x8005,
        init: 0,
        reflect_in: true,
        reflect_out: true,
        final_xor: false,
    };
    assert_eq!(check(16, arc), 0xBB3D);

    let ccitt = CrcConfig {
        polynomial: 0x1021,
        init: 0xFFFF,
        reflect_in: false,
        reflect_out: false,
        final_xor: false,
    };
    assert_eq!(check(16, ccitt), 0x29B1);
}

#[test]
fn crc64_xz_check_value() {
    let xz = CrcConfig {
        polynomial: 0x42F0_E1EB_A9EA_3693,
        init: u64::MAX,
        reflect_in: true,
        reflect_out: true,
        final_xor: true,
    };
    assert_eq!(check(64, xz), 0x995D_C9BB_DF19_39FA);
}

/// Init wider than the CRC is rejected.
#[test]
fn init_must_fit_width() {
    let config = CrcConfig {
        polynomial: 0x1021,
        init: 0x1_0000,
        ..CrcConfig::default()
    };
    assert!(Crc::new(16, config).is_err());

    let fits = CrcConfig {
        init: 0xFFFF,
        ..config
    };
    assert_eq!(Crc::new(16, fits).unwrap().width(), 16);
}

/// Two 32-bit words with swap: the CRC sees each word reversed, and the result differs
/// from the unswapped stream.
#[test]
fn swap_reverses_access_words() {
    let storage = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
    let swapped = prepare(&storage, 32, true);
    assert_eq!(swapped, vec![0x78, 0x56, 0x34, 0x12, 0xF0, 0xDE, 0xBC, 0x9A]);

    let crc = Crc::crc32();
    let raw = crc.checksum(prepare(&storage, 32, false));
    let word = crc.checksum(swapped);
    assert_eq!(raw, 0xA85A_34A3);
    assert_eq!(word, 0x8682_9DEB);
    assert_ne!(raw, word);
}

/// Without swap, or with 8-bit access, the stream is the storage order.
#[test]
fn access_is_inert_without_swap() {
    let storage = [1u8, 2, 3, 4, 5, 6, 7, 8];
    assert_eq!(prepare(&storage, 64, false), storage.to_vec());
    assert_eq!(prepare(&storage, 8, true), storage.to_vec());
    assert_eq!(prepare(&storage, 16, true), vec![2, 1, 4, 3, 6, 5, 8, 7]);
}
