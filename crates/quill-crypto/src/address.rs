//! Address derivation

use crate::{keccak256, Keccak, PublicKey};
use quill_primitives::{Address, H256};

/// Address of a signer: low 20 bytes of keccak256 over the uncompressed key
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let encoded = public_key.to_encoded_point(false);
    // skip the 0x04 SEC1 tag
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_digest(hash.as_bytes())
}

/// Address of a contract created by output `output_index` of the chain
/// transaction `carrier_hash`.
///
/// Every node re-executing the same transaction derives the same address.
pub fn contract_address(carrier_hash: &H256, output_index: u32) -> Address {
    let mut hasher = Keccak::new();
    hasher
        .update(carrier_hash.as_bytes())
        .update(output_index.to_le_bytes());
    Address::from_digest(hasher.finalize().as_bytes())
}
