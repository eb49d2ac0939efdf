//! # quill-module
//!
//! Contract bytecode for the Quill execution engine.
//!
//! This crate provides:
//! - [`Instruction`] / [`Opcode`] - the closed instruction set
//! - [`decompile`] - structural parse of raw bytes into a [`ModuleDescription`]
//! - [`Validator`] - deterministic-execution whitelist with numeric reason codes
//! - [`GasInjector`] - rewrites a module so every basic block pays for itself
//! - [`ModuleBuilder`] / [`MethodBuilder`] - encoder used by the injector and tests

#![warn(missing_docs)]
#![warn(clippy::all)]

mod builder;
mod decode;
mod error;
pub mod gas;
mod inject;
mod module;
mod opcode;
mod validate;

pub use builder::{MethodBuilder, ModuleBuilder};
pub use decode::decompile;
pub use error::{DecodeError, DecodeResult, InjectError, InjectResult};
pub use inject::{GasInjector, InjectionSummary, InstrumentedCode};
pub use module::{
    Import, Method, MethodAttributes, ModuleDescription, DEFAULT_BASE_TYPE, FORMAT_VERSION,
    MAGIC,
};
pub use opcode::{HostFunction, Instruction, Opcode};
pub use validate::{
    NonDeterminism, ValidationReason, ValidationResult, Validator, DEFAULT_MAX_CODE_SIZE,
};
