//! # quill-types
//!
//! Data types exchanged between the Quill execution engine and the node
//! around it.
//!
//! This crate provides:
//! - [`Value`](value::Value) - values contracts compute with and store
//! - [`ContractTransaction`](transaction::ContractTransaction) - Create/Call requests
//! - [`TransferRecord`](receipt::TransferRecord) and [`Log`](receipt::Log) - execution effects
//! - [`Transaction`](settlement::Transaction) - net settlement of internal transfers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod receipt;
pub mod settlement;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use receipt::{Log, TransferRecord};
pub use settlement::{Transaction, TxIn, TxOut, SETTLEMENT_VERSION};
pub use transaction::{BlockContext, ContractTransaction, ContractTxKind};
pub use value::Value;
