//! Effects recorded while a contract runs

use bytes::Bytes;
use quill_primitives::{Address, Amount};

/// One value movement observed during execution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRecord {
    /// Paying account
    pub from: Address,
    /// Receiving account
    pub to: Address,
    /// Amount moved
    pub amount: Amount,
}

impl TransferRecord {
    /// Create a transfer record
    pub fn new(from: Address, to: Address, amount: Amount) -> Self {
        Self { from, to, amount }
    }
}

/// Log entry emitted by a contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    /// Contract that emitted the log
    pub address: Address,
    /// Payload
    pub data: Bytes,
}

impl Log {
    /// Create a new log entry
    pub fn new(address: Address, data: impl Into<Bytes>) -> Self {
        Self {
            address,
            data: data.into(),
        }
    }
}
