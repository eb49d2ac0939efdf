//! secp256k1 signatures with public key recovery

use crate::CryptoError;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use quill_primitives::H256;

/// Public key
pub type PublicKey = VerifyingKey;

/// Private key
pub type PrivateKey = SigningKey;

/// Recoverable ECDSA signature, always in low-s form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// r component
    pub r: [u8; 32],
    /// s component
    pub s: [u8; 32],
    /// recovery id (0 or 1)
    pub v: u8,
}

impl Signature {
    /// Create signature from components
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Signature { r, s, v }
    }

    /// 65-byte form (r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    /// Parse the 65-byte form
    pub fn from_bytes(bytes: &[u8; 65]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Signature { r, s, v: bytes[64] }
    }

    fn to_k256(&self) -> Result<K256Signature, CryptoError> {
        K256Signature::from_scalars(self.r, self.s)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

/// Sign a prehashed message
pub fn sign(message_hash: &H256, private_key: &PrivateKey) -> Result<Signature, CryptoError> {
    let (mut signature, mut recovery_id) = private_key
        .sign_prehash_recoverable(message_hash.as_bytes())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    // s and n - s both verify; only the low form is accepted on chain
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::from_byte(recovery_id.to_byte() ^ 1)
            .ok_or_else(|| CryptoError::SigningFailed("recovery id flip".into()))?;
    }

    Ok(Signature {
        r: signature.r().to_bytes().into(),
        s: signature.s().to_bytes().into(),
        v: recovery_id.to_byte(),
    })
}

/// Verify a signature against a public key. High-s signatures never verify.
pub fn verify(
    message_hash: &H256,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<bool, CryptoError> {
    let sig = signature.to_k256()?;
    if sig.normalize_s().is_some() {
        return Ok(false);
    }

    use k256::ecdsa::signature::hazmat::PrehashVerifier;
    Ok(public_key.verify_prehash(message_hash.as_bytes(), &sig).is_ok())
}

/// Recover the signer's public key
pub fn recover_public_key(
    message_hash: &H256,
    signature: &Signature,
) -> Result<PublicKey, CryptoError> {
    let sig = signature.to_k256()?;
    if sig.normalize_s().is_some() {
        return Err(CryptoError::InvalidSignature("high s value".into()));
    }
    let recovery_id =
        RecoveryId::from_byte(signature.v).ok_or(CryptoError::InvalidRecoveryId(signature.v))?;

    VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}
