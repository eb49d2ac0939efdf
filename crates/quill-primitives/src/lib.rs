//! # quill-primitives
//!
//! Primitive types shared by every layer of the Quill contract engine.
//!
//! Everything here is plain data: fixed-width addresses and hashes plus the
//! integer aliases used for balances and gas.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;

pub use address::{Address, AddressError};
pub use error::PrimitiveError;
pub use hash::{HashError, H256};

// Re-export primitive-types for U256
pub use primitive_types::U256;

/// Native coin amount (smallest unit)
pub type Amount = u128;

/// Gas units
pub type Gas = u64;

/// Block height
pub type BlockNumber = u64;
