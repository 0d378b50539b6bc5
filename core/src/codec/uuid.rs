/// 128-bit UUID codec
///
/// The stack stores UUIDs as 16 raw bytes. The application side passes them as
/// two 64-bit halves (most/least significant). Bytes 0..8 carry the lsb half
/// and bytes 8..16 carry the msb half, each little-endian.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bluetooth base UUID (0000xxxx-0000-1000-8000-00805F9B34FB)
pub const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_00805F9B34FB;

/// Raw 16-byte UUID in stack byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Uuid128(pub [u8; 16]);

impl Uuid128 {
    /// All-zero UUID
    pub const NIL: Uuid128 = Uuid128([0u8; 16]);

    /// Build from a 128-bit integer (msb half in the high 64 bits)
    pub fn from_u128(value: u128) -> Self {
        encode_uuid((value >> 64) as u64, value as u64)
    }

    /// Build a Bluetooth SIG UUID from its 16-bit short form
    pub fn from_u16(short: u16) -> Self {
        Self::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
    }

    pub fn as_u128(&self) -> u128 {
        let (msb, lsb) = decode_uuid(self);
        ((msb as u128) << 64) | lsb as u128
    }

    pub fn is_nil(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<uuid::Uuid> for Uuid128 {
    fn from(value: uuid::Uuid) -> Self {
        let (msb, lsb) = value.as_u64_pair();
        encode_uuid(msb, lsb)
    }
}

impl From<Uuid128> for uuid::Uuid {
    fn from(value: Uuid128) -> Self {
        let (msb, lsb) = decode_uuid(&value);
        uuid::Uuid::from_u64_pair(msb, lsb)
    }
}

impl fmt::Display for Uuid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from(*self))
    }
}

/// Merge msb/lsb halves into stack byte order
pub fn encode_uuid(msb: u64, lsb: u64) -> Uuid128 {
    let mut bytes = [0u8; 16];
    bytes[0..8].copy_from_slice(&lsb.to_le_bytes());
    bytes[8..16].copy_from_slice(&msb.to_le_bytes());
    Uuid128(bytes)
}

/// Split stack byte order back into (msb, lsb)
pub fn decode_uuid(uuid: &Uuid128) -> (u64, u64) {
    let mut lsb = [0u8; 8];
    let mut msb = [0u8; 8];
    lsb.copy_from_slice(&uuid.0[0..8]);
    msb.copy_from_slice(&uuid.0[8..16]);
    (u64::from_le_bytes(msb), u64::from_le_bytes(lsb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_byte_layout() {
        let uuid = encode_uuid(0x0102030405060708, 0x0a0b0c0d0e0f1011);
        assert_eq!(
            uuid.0,
            [
                0x11, 0x10, 0x0f, 0x0e, 0x0d, 0x0c, 0x0b, 0x0a, 0x08, 0x07, 0x06, 0x05, 0x04,
                0x03, 0x02, 0x01
            ]
        );
    }

    #[test]
    fn test_short_uuid_expansion() {
        let heart_rate = Uuid128::from_u16(0x180D);
        assert_eq!(
            heart_rate.to_string(),
            "0000180d-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_uuid_crate_conversion() {
        let parsed = uuid::Uuid::parse_str("01020304-0506-0708-0a0b-0c0d0e0f1011").unwrap();
        let raw = Uuid128::from(parsed);
        assert_eq!(decode_uuid(&raw), (0x0102030405060708, 0x0a0b0c0d0e0f1011));
        assert_eq!(uuid::Uuid::from(raw), parsed);
    }

    #[test]
    fn test_nil() {
        assert!(Uuid128::NIL.is_nil());
        assert!(!Uuid128::from_u16(0x2902).is_nil());
    }

    proptest! {
        #[test]
        fn prop_split_merge_roundtrip(msb in any::<u64>(), lsb in any::<u64>()) {
            prop_assert_eq!(decode_uuid(&encode_uuid(msb, lsb)), (msb, lsb));
        }

        #[test]
        fn prop_merge_split_roundtrip(bytes in any::<[u8; 16]>()) {
            let uuid = Uuid128(bytes);
            let (msb, lsb) = decode_uuid(&uuid);
            prop_assert_eq!(encode_uuid(msb, lsb), uuid);
        }

        #[test]
        fn prop_u128_roundtrip(value in any::<u128>()) {
            prop_assert_eq!(Uuid128::from_u128(value).as_u128(), value);
        }
    }
}
