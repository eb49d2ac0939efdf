//! Keccak-256 hashing

use quill_primitives::H256;
use sha3::{Digest, Keccak256};

/// Compute Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256::from_bytes(hasher.finalize().into())
}

/// Incremental Keccak-256 hasher.
///
/// Used where a digest covers several fields and building one contiguous
/// buffer would only be thrown away.
#[derive(Clone, Default)]
pub struct Keccak {
    inner: Keccak256,
}

impl Keccak {
    /// Create an empty hasher
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes
    pub fn update(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.inner.update(data.as_ref());
        self
    }

    /// Feed a length-prefixed byte string, so adjacent fields cannot alias
    pub fn update_prefixed(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update((data.len() as u32).to_le_bytes());
        self.inner.update(data);
        self
    }

    /// Finish and return the digest
    pub fn finalize(self) -> H256 {
        H256::from_bytes(self.inner.finalize().into())
    }
}
