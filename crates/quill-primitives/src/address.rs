//! 160-bit account address

use std::fmt;
use thiserror::Error;

/// Address parsing error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid address length: expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// 20-byte account address.
///
/// Ordering is byte-wise, which is what the state repository relies on to
/// iterate accounts in the same order on every node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// Size of address in bytes
    pub const LEN: usize = 20;

    /// Zero address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create address from bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    /// Create address from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, AddressError> {
        let bytes: [u8; 20] = slice
            .try_into()
            .map_err(|_| AddressError::InvalidLength(slice.len()))?;
        Ok(Address(bytes))
    }

    /// Take the low 20 bytes of a 32-byte digest
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Address(bytes)
    }

    /// Parse address from hex string (with or without 0x prefix)
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Get as byte array
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Parsing ====================

    #[test]
    fn test_from_hex_with_and_without_prefix() {
        let a = Address::from_hex("0x00000000000000000000000000000000000000ff").unwrap();
        let b = Address::from_hex("00000000000000000000000000000000000000FF").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes()[19], 0xff);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(matches!(
            Address::from_hex("0xzz"),
            Err(AddressError::InvalidHex(_))
        ));
        assert_eq!(
            Address::from_hex("0x0102"),
            Err(AddressError::InvalidLength(2))
        );
    }

    #[test]
    fn test_from_slice_length() {
        assert!(Address::from_slice(&[1u8; 20]).is_ok());
        assert_eq!(
            Address::from_slice(&[1u8; 32]),
            Err(AddressError::InvalidLength(32))
        );
    }

    #[test]
    fn test_from_digest_takes_low_bytes() {
        let mut digest = [0u8; 32];
        digest[12] = 0xaa;
        digest[31] = 0xbb;
        let addr = Address::from_digest(&digest);
        assert_eq!(addr.as_bytes()[0], 0xaa);
        assert_eq!(addr.as_bytes()[19], 0xbb);
    }

    // ==================== Ordering & display ====================

    #[test]
    fn test_ordering_is_bytewise() {
        let low = Address::from_bytes([0x01; 20]);
        let high = Address::from_bytes([0x02; 20]);
        assert!(low < high);
        assert!(Address::ZERO < low);
    }

    #[test]
    fn test_display_roundtrip() {
        let addr = Address::from_bytes([0xab; 20]);
        let text = addr.to_string();
        assert_eq!(text, format!("0x{}", "ab".repeat(20)));
        assert_eq!(Address::from_hex(&text).unwrap(), addr);
        assert!(format!("{:?}", addr).starts_with("Address(0x"));
    }

    #[test]
    fn test_zero() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::from_bytes([1; 20]).is_zero());
        assert_eq!(Address::default(), Address::ZERO);
    }
}
