//! Module error types

use thiserror::Error;

/// Structural decode failure (malformed code)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input does not start with the module magic
    #[error("bad magic")]
    BadMagic,

    /// Unknown format version
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// Unknown module flag bits
    #[error("unknown module flags: 0x{0:02x}")]
    UnknownFlags(u8),

    /// Input ended early
    #[error("truncated at offset {0}")]
    Truncated(usize),

    /// Name is not valid UTF-8
    #[error("invalid utf-8 at offset {0}")]
    InvalidUtf8(usize),

    /// Byte is not an opcode
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode {
        /// Offending byte
        opcode: u8,
        /// Byte offset in the module
        offset: usize,
    },

    /// Unknown method attribute bits
    #[error("unknown method attributes: 0x{0:02x}")]
    UnknownAttributes(u8),

    /// Bytes left after the last method
    #[error("trailing bytes at offset {0}")]
    TrailingBytes(usize),
}

/// Result type for decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Gas injection failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InjectError {
    /// Module already carries metering
    #[error("module is already instrumented")]
    AlreadyInstrumented,

    /// Stored code was expected to carry metering
    #[error("stored code is not instrumented")]
    NotInstrumented,

    /// Jump outside its method
    #[error("jump target {target} out of range in method {method}")]
    InvalidJumpTarget {
        /// Method name
        method: String,
        /// Offending target
        target: u32,
    },

    /// Rewritten method no longer fits the format
    #[error("method {0} too large after instrumentation")]
    MethodTooLarge(String),

    /// Stored code failed to decode
    #[error("stored code: {0}")]
    Decode(#[from] DecodeError),
}

/// Result type for injection
pub type InjectResult<T> = Result<T, InjectError>;
