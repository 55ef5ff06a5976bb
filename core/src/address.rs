//! # Participant & Asset Addresses
//!
//! Every party the core talks about — users, assets, the payout sink, the
//! solver — is identified by a 20-byte [`Address`]. The core never
//! interprets the bytes; it only compares them and hands them to the
//! collaborator ledgers.
//!
//! Displayed and serialized as `0x`-prefixed lowercase hex, parsed with or
//! without the prefix.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of an address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Error returned when parsing an address from a hex string fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    /// The string does not decode as hex.
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),
    /// The decoded byte length is not 20.
    #[error("address must be {ADDRESS_LENGTH} bytes, got {0}")]
    BadLength(usize),
}

/// A 20-byte participant or asset identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address. Used as "nobody" / "not set".
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Builds an address from raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Address(bytes)
    }

    /// Deterministic development/test address: the index written into the
    /// trailing 8 bytes. `dev(0)` is deliberately NOT [`Address::ZERO`] —
    /// the leading byte is set so that index 0 still names somebody.
    pub const fn dev(index: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[0] = 0xBA;
        let ix = index.to_be_bytes();
        let mut i = 0;
        while i < 8 {
            bytes[ADDRESS_LENGTH - 8 + i] = ix[i];
            i += 1;
        }
        Address(bytes)
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Returns `true` if this is the all-zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    /// Truncated form for logs: `0xba00..0001`. The full 40 hex chars
    /// drown every log line they appear in.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = hex::encode(self.0);
        write!(f, "0x{}..{}", &full[..4], &full[full.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(stripped).map_err(|_| AddressParseError::InvalidHex(s.to_string()))?;
        let array: [u8; ADDRESS_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::BadLength(bytes.len()))?;
        Ok(Address(array))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_roundtrip() {
        let addr = Address::dev(42);
        let s = addr.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 2 + 2 * ADDRESS_LENGTH);
        assert_eq!(Address::from_str(&s).unwrap(), addr);
    }

    #[test]
    fn parse_without_prefix() {
        let addr = Address::dev(7);
        let bare = hex::encode(addr.0);
        assert_eq!(Address::from_str(&bare).unwrap(), addr);
    }

    #[test]
    fn parse_rejects_bad_length() {
        let result = Address::from_str("0xdeadbeef");
        assert_eq!(result.unwrap_err(), AddressParseError::BadLength(4));
    }

    #[test]
    fn parse_rejects_non_hex() {
        let result = Address::from_str("0xzz00000000000000000000000000000000000000");
        assert!(matches!(
            result.unwrap_err(),
            AddressParseError::InvalidHex(_)
        ));
    }

    #[test]
    fn dev_addresses_are_distinct_and_nonzero() {
        assert_ne!(Address::dev(0), Address::ZERO);
        assert_ne!(Address::dev(1), Address::dev(2));
        assert!(Address::ZERO.is_zero());
        assert!(!Address::dev(0).is_zero());
    }

    #[test]
    fn serde_as_hex_string() {
        let addr = Address::dev(1);
        let json = serde_json::to_string(&addr).unwrap();
        assert!(json.starts_with("\"0x"));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
