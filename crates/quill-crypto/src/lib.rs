//! # quill-crypto
//!
//! Cryptographic primitives for the Quill contract engine.
//!
//! - Keccak-256 hashing
//! - secp256k1 signing and signer recovery
//! - Address derivation (signer addresses and deterministic contract addresses)

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;
mod signature;

pub use address::{contract_address, public_key_to_address};
pub use error::CryptoError;
pub use hash::{keccak256, Keccak};
pub use signature::{recover_public_key, sign, verify, PrivateKey, PublicKey, Signature};
