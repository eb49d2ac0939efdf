//! # quill-vm
//!
//! Metered virtual machine for Quill contracts.
//!
//! This crate provides:
//! - [`Vm`] - runs one method of an [`InstrumentedCode`](quill_module::InstrumentedCode)
//!   against a tracked [`StateView`](quill_state::StateView)
//! - [`ExecutionContext`] - block, call and transaction environment
//! - [`ExecutionResult`] / [`FailureReason`] - structured outcome
//! - [`GasMeter`] - debits the `Gas` instructions written by the injector
//!
//! The VM never commits or rolls back the view it is handed. A revert result
//! tells the caller to roll back.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod context;
mod error;
mod gas;
mod interpreter;
mod result;
mod stack;

pub use context::{CallContext, ExecutionContext, TxContext};
pub use error::{VmError, VmResult};
pub use gas::GasMeter;
pub use interpreter::{Vm, VmConfig};
pub use quill_types::BlockContext;
pub use result::{ExecutionResult, FailureReason, RevertReason};
pub use stack::Stack;
