//! VM fault types

use quill_module::Opcode;
use quill_primitives::Address;
use quill_state::StateError;
use thiserror::Error;

/// Runtime faults. Any of these ends the run with a revert.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Gas limit reached
    #[error("out of gas")]
    OutOfGas,

    /// Pop from an empty stack
    #[error("stack underflow")]
    StackUnderflow,

    /// Push beyond the stack limit
    #[error("stack overflow (max {0})")]
    StackOverflow(usize),

    /// Operand of the wrong kind
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected kind
        expected: &'static str,
        /// Kind found on the stack
        found: &'static str,
    },

    /// Checked arithmetic overflowed
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Jump outside the method
    #[error("invalid jump destination: {0}")]
    InvalidJump(u32),

    /// Local slot does not exist
    #[error("local {0} out of range")]
    LocalOutOfRange(u8),

    /// Argument does not exist
    #[error("argument {0} out of range")]
    ArgumentOutOfRange(u8),

    /// Instruction that may not run
    #[error("forbidden instruction {0:?}")]
    ForbiddenInstruction(Opcode),

    /// Import index that does not resolve to a host function
    #[error("unresolved import {0}")]
    UnresolvedImport(u16),

    /// Method name or index not in the module
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Method exists but cannot be called from outside
    #[error("method not callable: {0}")]
    MethodNotCallable(String),

    /// Wrong number of arguments
    #[error("expected {expected} arguments, got {found}")]
    ArgumentCountMismatch {
        /// Declared parameter count
        expected: usize,
        /// Arguments supplied
        found: usize,
    },

    /// Too many nested contract or method calls
    #[error("call depth exceeded (max {0})")]
    CallDepthExceeded(usize),

    /// Called address has no code
    #[error("contract not found: {0}")]
    ContractNotFound(Address),

    /// Called contract's code carries no metering
    #[error("callee not instrumented: {0}")]
    CalleeNotInstrumented(Address),

    /// A byte string grew past the configured cap
    #[error("value too large: {size} bytes (max {limit})")]
    ValueTooLarge {
        /// Size the operation would produce
        size: usize,
        /// Configured cap
        limit: usize,
    },

    /// Contract-initiated abort
    #[error("aborted")]
    Aborted(Vec<u8>),

    /// State operation failed
    #[error("state: {0}")]
    State(#[from] StateError),
}

/// Result type for VM operations
pub type VmResult<T> = Result<T, VmError>;
