//! State error types

use quill_primitives::{Address, Amount};
use thiserror::Error;

/// State errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Code is immutable once deployed
    #[error("code already set at {0}")]
    CodeAlreadySet(Address),

    /// Deploying empty code
    #[error("empty code for {0}")]
    EmptyCode(Address),

    /// Balance subtraction would go negative
    #[error("insufficient funds in {account}: required {required}, available {available}")]
    InsufficientFunds {
        /// Debited account
        account: Address,
        /// Amount requested
        required: Amount,
        /// Balance at the time
        available: Amount,
    },

    /// Balance addition would overflow
    #[error("balance overflow for {0}")]
    BalanceOverflow(Address),

    /// A sibling view committed to an account this view had read
    #[error("commit conflict on {0}")]
    Conflict(Address),
}

/// Result type for state operations
pub type StateResult<T> = Result<T, StateError>;
