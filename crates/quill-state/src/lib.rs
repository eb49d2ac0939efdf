//! # quill-state
//!
//! Account state for the Quill execution engine.
//!
//! This crate provides:
//! - [`StateRepository`] - committed balances, code and contract storage
//! - [`StateView`] - an isolated layer of pending writes, nestable
//! - [`StateReader`] / [`Tracked`] - read access and view creation
//!
//! All mutation goes through a view. The repository itself only changes when
//! a view opened directly on it is committed.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod changes;
mod error;
mod repository;
mod traits;
mod view;

pub use error::{StateError, StateResult};
pub use repository::StateRepository;
pub use traits::{Account, StateReader, Tracked};
pub use view::StateView;
