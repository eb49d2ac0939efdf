//! Execution outcome

use crate::error::VmError;
use quill_module::ValidationReason;
use quill_primitives::{Address, Amount, Gas};
use quill_state::StateError;
use quill_types::{Log, Transaction, TransferRecord, Value};

/// Why an abort or fault reverted execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    /// Contract executed `Abort` with this payload
    Aborted(Vec<u8>),
    /// Runtime fault
    Fault(String),
}

/// Structured failure kinds reported to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Code could not be decoded
    MalformedCode(String),
    /// Validator rejected the module
    ValidationRejected(Vec<ValidationReason>),
    /// Gas limit reached
    OutOfGas,
    /// Abort or runtime fault
    Revert(RevertReason),
    /// A balance would have gone negative
    InsufficientFunds {
        /// Account debited
        account: Address,
        /// Amount required
        required: Amount,
        /// Amount available
        available: Amount,
    },
    /// Address already carries code
    CodeAlreadySet(Address),
    /// Called address has no code
    ContractNotFound(Address),
    /// Recorded transfers could not be settled
    SettlementFailed(String),
    /// A sibling commit touched an account this execution read
    StateConflict(Address),
}

impl From<VmError> for FailureReason {
    fn from(err: VmError) -> Self {
        match err {
            VmError::OutOfGas => FailureReason::OutOfGas,
            VmError::Aborted(payload) => FailureReason::Revert(RevertReason::Aborted(payload)),
            VmError::ContractNotFound(address) => FailureReason::ContractNotFound(address),
            VmError::State(StateError::InsufficientFunds {
                account,
                required,
                available,
            }) => FailureReason::InsufficientFunds {
                account,
                required,
                available,
            },
            VmError::State(StateError::CodeAlreadySet(address)) => {
                FailureReason::CodeAlreadySet(address)
            }
            VmError::State(StateError::Conflict(address)) => FailureReason::StateConflict(address),
            other => FailureReason::Revert(RevertReason::Fault(other.to_string())),
        }
    }
}

/// Result of running a method or a whole transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Whether execution succeeded
    pub success: bool,
    /// State changes must be rolled back
    pub revert: bool,
    /// Gas used
    pub gas_consumed: Gas,
    /// Value movements in emission order
    pub transfers: Vec<TransferRecord>,
    /// Derived settlement transactions
    pub transactions: Vec<Transaction>,
    /// Value returned by the method
    pub return_value: Option<Value>,
    /// Logs emitted
    pub logs: Vec<Log>,
    /// Set whenever `success` is false
    pub failure: Option<FailureReason>,
}

impl ExecutionResult {
    /// Create a successful result
    pub fn success(
        gas_consumed: Gas,
        return_value: Option<Value>,
        transfers: Vec<TransferRecord>,
        logs: Vec<Log>,
    ) -> Self {
        Self {
            success: true,
            revert: false,
            gas_consumed,
            transfers,
            transactions: Vec::new(),
            return_value,
            logs,
            failure: None,
        }
    }

    /// Create a revert result. The caller rolls back.
    pub fn revert(gas_consumed: Gas, reason: FailureReason) -> Self {
        Self {
            revert: true,
            ..Self::failure(gas_consumed, reason)
        }
    }

    /// Create a terminal failure that never ran any code
    pub fn failure(gas_consumed: Gas, reason: FailureReason) -> Self {
        Self {
            success: false,
            revert: false,
            gas_consumed,
            transfers: Vec::new(),
            transactions: Vec::new(),
            return_value: None,
            logs: Vec::new(),
            failure: Some(reason),
        }
    }

    /// Fee charged at `gas_price`
    pub fn fee(&self, gas_price: Amount) -> Amount {
        Amount::from(self.gas_consumed).saturating_mul(gas_price)
    }

    /// Check whether the failure was running out of gas
    pub fn is_out_of_gas(&self) -> bool {
        matches!(self.failure, Some(FailureReason::OutOfGas))
    }
}
