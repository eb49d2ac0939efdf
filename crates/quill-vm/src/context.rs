//! Execution context

use quill_primitives::{Address, Amount, Gas};
use quill_types::{BlockContext, Value};

/// Call-level information
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallContext {
    /// Contract being executed
    pub contract: Address,
    /// Caller: the transaction sender, or the calling contract
    pub caller: Address,
    /// Value attached to the call
    pub value: Amount,
    /// Method to run (ignored when running the initializer)
    pub method: String,
    /// Arguments
    pub parameters: Vec<Value>,
}

/// Transaction-level information
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxContext {
    /// Gas limit
    pub gas_limit: Gas,
    /// Fee per gas unit
    pub gas_price: Amount,
}

/// Everything a running contract can observe about its environment.
///
/// Built once per transaction and identical on every node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Block environment
    pub block: BlockContext,
    /// Call environment
    pub call: CallContext,
    /// Transaction environment
    pub tx: TxContext,
}

impl ExecutionContext {
    /// Create an execution context
    pub fn new(block: BlockContext, call: CallContext, tx: TxContext) -> Self {
        Self { block, call, tx }
    }
}
