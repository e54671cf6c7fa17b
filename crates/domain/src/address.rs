//! Hardware address of a BLE peripheral.
//!
//! The address is the primary key of a discovered peripheral: two records
//! with the same address are the same peripheral.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressParseError;

/// A 48-bit Bluetooth device address, rendered as `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 6]);

impl Address {
    /// Wrap raw address bytes (most significant byte first).
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Access the raw address bytes.
    #[must_use]
    pub const fn octets(self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');

        for byte in &mut bytes {
            let part = parts
                .next()
                .ok_or_else(|| AddressParseError::new(s))?;
            if part.len() != 2 {
                return Err(AddressParseError::new(s));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| AddressParseError::new(s))?;
        }

        if parts.next().is_some() {
            return Err(AddressParseError::new(s));
        }

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_colon_separated_address() {
        let addr: Address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(addr.octets(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    }

    #[test]
    fn should_parse_lowercase_and_render_uppercase() {
        let addr: Address = "a4:c1:38:5b:0e:df".parse().unwrap();
        assert_eq!(addr.to_string(), "A4:C1:38:5B:0E:DF");
    }

    #[test]
    fn should_reject_short_address() {
        let result = Address::from_str("AA:BB:CC:DD:EE");
        assert!(result.is_err());
    }

    #[test]
    fn should_reject_trailing_octet() {
        let result = Address::from_str("AA:BB:CC:DD:EE:FF:00");
        assert!(result.is_err());
    }

    #[test]
    fn should_reject_non_hex_octet() {
        let err = Address::from_str("AA:BB:CC:DD:EE:ZZ").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid hardware address \"AA:BB:CC:DD:EE:ZZ\""
        );
    }

    #[test]
    fn should_serialize_as_display_string() {
        let addr = Address::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"01:02:03:04:05:06\"");
    }
}
