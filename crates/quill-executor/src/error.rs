//! Executor error types

use quill_primitives::{Address, Amount};
use thiserror::Error;

/// Transfer condensing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CondenseError {
    /// A recorded debit exceeds the running balance
    #[error("transfer {index} overdraws {account}: required {required}, available {available}")]
    Overdraft {
        /// Position in the transfer list
        index: usize,
        /// Debited account
        account: Address,
        /// Amount debited
        required: Amount,
        /// Running balance before the debit
        available: Amount,
    },

    /// Running balance or net total does not fit an amount
    #[error("amount overflow for {0}")]
    Overflow(Address),
}

/// Result type for condensing
pub type CondenseResult<T> = Result<T, CondenseError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON did not parse
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;
