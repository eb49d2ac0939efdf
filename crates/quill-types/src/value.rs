//! Contract values
//!
//! Everything a contract pushes on its stack, passes as a parameter or keeps
//! in storage is a [`Value`]. The canonical encoding is used for parameter
//! hashing and for storage slots, so it must never change:
//!
//! | tag    | payload                         |
//! |--------|---------------------------------|
//! | `0x01` | 32-byte big-endian integer      |
//! | `0x02` | u32-le length, then the bytes   |
//! | `0x03` | 20-byte address                 |

use quill_primitives::{Address, U256};
use std::fmt;

const TAG_INT: u8 = 0x01;
const TAG_BYTES: u8 = 0x02;
const TAG_ADDRESS: u8 = 0x03;

/// A value manipulated by contract code
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Unsigned 256-bit integer
    Int(U256),
    /// Byte string
    Bytes(Vec<u8>),
    /// Account address
    Address(Address),
}

impl Value {
    /// Integer zero
    pub fn zero() -> Self {
        Value::Int(U256::zero())
    }

    /// Boolean as integer 0/1
    pub fn from_bool(flag: bool) -> Self {
        if flag {
            Value::Int(U256::one())
        } else {
            Value::zero()
        }
    }

    /// Short type name used in fault messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bytes(_) => "bytes",
            Value::Address(_) => "address",
        }
    }

    /// Integer payload, if this is an integer
    pub fn as_int(&self) -> Option<U256> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Byte payload, if this is a byte string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Address payload, if this is an address
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// Non-zero integer, non-empty bytes, non-zero address
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(v) => !v.is_zero(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Address(a) => !a.is_zero(),
        }
    }

    /// Length of [`Value::key_bytes`] without building it
    pub fn key_len(&self) -> usize {
        match self {
            Value::Int(_) => 32,
            Value::Bytes(b) => b.len(),
            Value::Address(_) => Address::LEN,
        }
    }

    /// Untagged payload, used as a storage key
    pub fn key_bytes(&self) -> Vec<u8> {
        match self {
            Value::Int(v) => {
                let mut buf = [0u8; 32];
                v.to_big_endian(&mut buf);
                buf.to_vec()
            }
            Value::Bytes(b) => b.clone(),
            Value::Address(a) => a.as_bytes().to_vec(),
        }
    }

    /// Append the canonical encoding to `buf`
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Value::Int(v) => {
                let mut word = [0u8; 32];
                v.to_big_endian(&mut word);
                buf.push(TAG_INT);
                buf.extend_from_slice(&word);
            }
            Value::Bytes(b) => {
                buf.push(TAG_BYTES);
                buf.extend_from_slice(&(b.len() as u32).to_le_bytes());
                buf.extend_from_slice(b);
            }
            Value::Address(a) => {
                buf.push(TAG_ADDRESS);
                buf.extend_from_slice(a.as_bytes());
            }
        }
    }

    /// Canonical encoding
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Decode one value from the front of `bytes`.
    ///
    /// Returns the value and the number of bytes consumed.
    pub fn decode_prefix(bytes: &[u8]) -> Option<(Value, usize)> {
        let (&tag, rest) = bytes.split_first()?;
        match tag {
            TAG_INT => {
                let word = rest.get(..32)?;
                Some((Value::Int(U256::from_big_endian(word)), 33))
            }
            TAG_BYTES => {
                let len = u32::from_le_bytes(rest.get(..4)?.try_into().ok()?) as usize;
                let end = 4usize.checked_add(len)?;
                let payload = rest.get(4..end)?;
                Some((Value::Bytes(payload.to_vec()), 1 + end))
            }
            TAG_ADDRESS => {
                let addr = Address::from_slice(rest.get(..20)?).ok()?;
                Some((Value::Address(addr), 21))
            }
            _ => None,
        }
    }

    /// Decode exactly one value; trailing bytes are an error
    pub fn decode(bytes: &[u8]) -> Option<Value> {
        match Self::decode_prefix(bytes)? {
            (value, used) if used == bytes.len() => Some(value),
            _ => None,
        }
    }

    /// Canonical encoding of a parameter list (u16-le count, then values)
    pub fn encode_list(values: &[Value]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(values.len() as u16).to_le_bytes());
        for value in values {
            value.encode_into(&mut buf);
        }
        buf
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Bytes(b) => write!(f, "Bytes(0x{})", hex_string(b)),
            Value::Address(a) => write!(f, "Address({})", a),
        }
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(U256::from(v))
    }
}

impl From<u128> for Value {
    fn from(v: u128) -> Self {
        Value::Int(U256::from(v))
    }
}

impl From<U256> for Value {
    fn from(v: U256) -> Self {
        Value::Int(v)
    }
}

impl From<Address> for Value {
    fn from(a: Address) -> Self {
        Value::Address(a)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Encoding tests ====================

    #[test]
    fn test_int_encoding_layout() {
        let encoded = Value::from(0x0102u64).encode();
        assert_eq!(encoded.len(), 33);
        assert_eq!(encoded[0], TAG_INT);
        assert_eq!(&encoded[31..], &[0x01, 0x02]);
    }

    #[test]
    fn test_bytes_encoding_layout() {
        let encoded = Value::from("ab").encode();
        assert_eq!(encoded, vec![TAG_BYTES, 2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn test_address_encoding_layout() {
        let addr = Address::from_bytes([0x33; 20]);
        let encoded = Value::from(addr).encode();
        assert_eq!(encoded[0], TAG_ADDRESS);
        assert_eq!(&encoded[1..], addr.as_bytes());
    }

    #[test]
    fn test_decode_each_kind() {
        for value in [
            Value::from(u64::MAX),
            Value::from(vec![9u8; 40]),
            Value::from(Address::from_bytes([7; 20])),
        ] {
            assert_eq!(Value::decode(&value.encode()), Some(value));
        }
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(Value::decode(&[]), None);
        assert_eq!(Value::decode(&[0x09]), None);
        assert_eq!(Value::decode(&[TAG_INT, 0, 0]), None);
        assert_eq!(Value::decode(&[TAG_BYTES, 5, 0, 0, 0, 1]), None);

        let mut trailing = Value::zero().encode();
        trailing.push(0);
        assert_eq!(Value::decode(&trailing), None);
    }

    #[test]
    fn test_decode_prefix_reports_length() {
        let mut buf = Value::from("x").encode();
        buf.extend(Value::from(1u64).encode());
        let (first, used) = Value::decode_prefix(&buf).unwrap();
        assert_eq!(first, Value::from("x"));
        assert_eq!(used, 6);
        let (second, _) = Value::decode_prefix(&buf[used..]).unwrap();
        assert_eq!(second, Value::from(1u64));
    }

    #[test]
    fn test_encode_list_prefixes_count() {
        let list = Value::encode_list(&[Value::zero(), Value::from("a")]);
        assert_eq!(&list[..2], &[2, 0]);
        assert_eq!(list.len(), 2 + 33 + 6);
    }

    // ==================== Accessor tests ====================

    #[test]
    fn test_truthiness() {
        assert!(!Value::zero().is_truthy());
        assert!(Value::from(1u64).is_truthy());
        assert!(!Value::Bytes(vec![]).is_truthy());
        assert!(Value::from("a").is_truthy());
        assert!(!Value::from(Address::ZERO).is_truthy());
        assert!(Value::from_bool(true).is_truthy());
    }

    #[test]
    fn test_key_bytes_are_untagged() {
        assert_eq!(Value::from("slot").key_bytes(), b"slot".to_vec());
        assert_eq!(Value::from(1u64).key_bytes().len(), 32);
    }

    #[test]
    fn test_key_len_matches_key_bytes() {
        for v in [
            Value::from(7u64),
            Value::from("abc"),
            Value::Bytes(Vec::new()),
            Value::Address(Address::from_bytes([9u8; 20])),
        ] {
            assert_eq!(v.key_len(), v.key_bytes().len());
        }
    }

    #[test]
    fn test_accessors() {
        let v = Value::from(5u64);
        assert_eq!(v.as_int(), Some(U256::from(5u64)));
        assert_eq!(v.as_bytes(), None);
        assert_eq!(v.type_name(), "int");
        assert_eq!(Value::from("z").as_bytes(), Some(&b"z"[..]));
    }
}
