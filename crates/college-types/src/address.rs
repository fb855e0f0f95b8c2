//! Wallet and contract addresses.
//!
//! This module is the canonical source for address handling in the workspace.
//! Other crates should import from here rather than defining their own logic.
//!
//! EVM addresses are 20-byte values. They show up in a few textual forms:
//! - Checksummed: "0x8FeC745D6fa25355642BC22716fC37EDcC4a85d5"
//! - Lowercase: "0x8fec745d6fa25355642bc22716fc37edcc4a85d5"
//! - Without prefix: "8fec745d6fa25355642bc22716fc37edcc4a85d5"
//!
//! All of them parse into the same [`Address`]; display is always lowercase.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of bytes in an EVM address.
pub const ADDRESS_LENGTH: usize = 20;

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The zero address.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Build an address whose last byte is `n`. Handy for fixtures.
    pub const fn from_low_u8(n: u8) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 1] = n;
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Parse a hex address, with or without `0x`.
    ///
    /// Short forms are left-padded with zeros, so `"0x2"` is accepted.
    pub fn parse(addr: &str) -> Result<Self> {
        let s = addr.trim();
        let hex_str = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if hex_str.is_empty() {
            return Err(anyhow!("empty address"));
        }
        if hex_str.len() > ADDRESS_LENGTH * 2 {
            return Err(anyhow!("address too long: {}", addr));
        }
        if !hex_str.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow!("invalid hex address: {}", addr));
        }

        let padded = format!("{:0>40}", hex_str);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(&padded, &mut bytes)
            .map_err(|e| anyhow!("invalid address '{}': {}", addr, e))?;
        Ok(Self(bytes))
    }

    /// Full lowercase form with `0x` prefix.
    pub fn to_hex_literal(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Display form used in notices: first 6 and last 4 characters.
    ///
    /// ```
    /// use college_types::Address;
    ///
    /// let addr = Address::parse("0x8FeC745D6fa25355642BC22716fC37EDcC4a85d5").unwrap();
    /// assert_eq!(addr.short(), "0x8fec...85d5");
    /// ```
    pub fn short(&self) -> String {
        let full = self.to_hex_literal();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_literal())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex_literal())
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_literal())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_and_short() {
        let full = Address::parse("0x8FeC745D6fa25355642BC22716fC37EDcC4a85d5").unwrap();
        assert_eq!(
            full.to_hex_literal(),
            "0x8fec745d6fa25355642bc22716fc37edcc4a85d5"
        );

        let short = Address::parse("0x2").unwrap();
        assert_eq!(short, Address::from_low_u8(2));

        // Whitespace and uppercase prefix
        let spaced = Address::parse("  0XABC  ").unwrap();
        assert_eq!(
            spaced.to_hex_literal(),
            "0x0000000000000000000000000000000000000abc"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("0x").is_err());
        assert!(Address::parse("not-hex").is_err());
        assert!(Address::parse("0x8FeC745D6fa25355642BC22716fC37EDcC4a85d5ff").is_err());
    }

    #[test]
    fn test_short_form() {
        let addr = Address::from_low_u8(0xab);
        assert_eq!(addr.short(), "0x0000...00ab");
    }

    #[test]
    fn test_serde_as_hex_string() {
        let addr = Address::from_low_u8(7);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x0000000000000000000000000000000000000007\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_zero() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::from_low_u8(1).is_zero());
    }
}
