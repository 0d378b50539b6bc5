/// Device address codec
///
/// Six raw bytes on the stack side, `XX:XX:XX:XX:XX:XX` text on the
/// application side. Parsing is strict: exactly 17 ASCII characters, hex pairs
/// separated by colons. Formatting is always uppercase.

use crate::error::BridgeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of the textual address form
pub const ADDRESS_TEXT_LEN: usize = 17;

/// Raw device address in stack byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceAddress(pub [u8; 6]);

impl DeviceAddress {
    pub const ANY: DeviceAddress = DeviceAddress([0u8; 6]);

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

/// Parse colon-hex text into raw bytes. Accepts either case.
pub fn parse_address(text: &str) -> Result<DeviceAddress, BridgeError> {
    let malformed = || BridgeError::MalformedAddress(text.to_string());

    let bytes = text.as_bytes();
    if bytes.len() != ADDRESS_TEXT_LEN || !text.is_ascii() {
        return Err(malformed());
    }

    let mut address = [0u8; 6];
    for (i, octet) in address.iter_mut().enumerate() {
        let start = i * 3;
        if i < 5 && bytes[start + 2] != b':' {
            return Err(malformed());
        }
        let mut out = [0u8; 1];
        hex::decode_to_slice(&bytes[start..start + 2], &mut out).map_err(|_| malformed())?;
        *octet = out[0];
    }

    Ok(DeviceAddress(address))
}

/// Format raw bytes as uppercase colon-hex text
pub fn format_address(address: &DeviceAddress) -> String {
    address
        .0
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(":")
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_address(self))
    }
}

impl FromStr for DeviceAddress {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s)
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_address(self))
    }
}

impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_address(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_known_address() {
        let addr = parse_address("AA:BB:CC:DD:EE:FF").expect("valid address");
        assert_eq!(addr.0, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    }

    #[test]
    fn test_parse_lowercase_formats_uppercase() {
        let addr = parse_address("0a:1b:2c:3d:4e:5f").expect("valid address");
        assert_eq!(format_address(&addr), "0A:1B:2C:3D:4E:5F");
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        for text in ["", "AA:BB:CC:DD:EE", "AA:BB:CC:DD:EE:FF:", "AABBCCDDEEFF"] {
            assert_eq!(
                parse_address(text),
                Err(BridgeError::MalformedAddress(text.to_string()))
            );
        }
    }

    #[test]
    fn test_parse_rejects_bad_separators_and_digits() {
        assert!(parse_address("AA-BB-CC-DD-EE-FF").is_err());
        assert!(parse_address("AA:BB:CC:DD:EE:GG").is_err());
        assert!(parse_address("AA:BB:CC:DD:EE:F ").is_err());
    }

    #[test]
    fn test_parse_rejects_multibyte_text() {
        // 17 bytes, but not ASCII
        assert!(parse_address("AA:BB:CC:DD:EE:\u{e9}").is_err());
    }

    #[test]
    fn test_serde_text_form() {
        let addr = DeviceAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"00:11:22:33:44:55\"");
        let back: DeviceAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<DeviceAddress>("\"nope\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_format_parse_normalises(bytes in any::<[u8; 6]>(), lower in any::<bool>()) {
            let text = format_address(&DeviceAddress(bytes));
            let input = if lower { text.to_lowercase() } else { text.clone() };
            let parsed = parse_address(&input).expect("formatted address parses");
            prop_assert_eq!(format_address(&parsed), input.to_uppercase());
            prop_assert_eq!(parsed.0, bytes);
        }

        #[test]
        fn prop_wrong_length_rejected(text in "[0-9A-F:]{0,40}") {
            prop_assume!(text.len() != ADDRESS_TEXT_LEN);
            prop_assert!(parse_address(&text).is_err());
        }
    }
}
