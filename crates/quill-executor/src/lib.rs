//! # quill-executor
//!
//! Drives one contract transaction through the engine:
//!
//! ```text
//! Start -> TrackingOpen -> Decompiled -> Validated -> Injected -> Executed
//!       -> Committed | RolledBack -> Done
//! ```
//!
//! - [`TransactionExecutor`] - create and call paths over any [`Tracked`](quill_state::Tracked) state
//! - [`Condenser`] - nets recorded transfers into a settlement [`Transaction`](quill_types::Transaction)
//! - [`ExecutorConfig`] - limits, loadable from JSON
//!
//! Every failure comes back as an [`ExecutionResult`](quill_vm::ExecutionResult)
//! with a [`FailureReason`](quill_vm::FailureReason); nothing is returned as `Err`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod condenser;
mod config;
mod error;
mod executor;

pub use condenser::Condenser;
pub use config::ExecutorConfig;
pub use error::{CondenseError, CondenseResult, ConfigError, ConfigResult};
pub use executor::{ExecutorState, TransactionExecutor};
