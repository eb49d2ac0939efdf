//! Settlement transactions
//!
//! A settlement transaction moves, on chain, the net result of the value
//! transfers a contract made internally. Inputs name the accounts that paid
//! out on balance, outputs the accounts that received on balance.

use quill_crypto::Keccak;
use quill_primitives::{Address, Amount, H256};

/// Current settlement format version
pub const SETTLEMENT_VERSION: u8 = 1;

/// Value consumed from an account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    /// Paying account
    pub source: Address,
    /// Net amount paid
    pub value: Amount,
}

/// Value created for an account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    /// Receiving account
    pub destination: Address,
    /// Net amount received
    pub value: Amount,
}

/// On-chain settlement transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Format version
    pub version: u8,
    /// Carrier hash of the contract transaction that caused the transfers
    pub origin: H256,
    /// Net payers
    pub inputs: Vec<TxIn>,
    /// Net recipients
    pub outputs: Vec<TxOut>,
}

impl Transaction {
    /// Empty settlement for `origin`
    pub fn new(origin: H256) -> Self {
        Self {
            version: SETTLEMENT_VERSION,
            origin,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Sum of inputs, `None` on overflow
    pub fn total_in(&self) -> Option<Amount> {
        self.inputs
            .iter()
            .try_fold(0u128, |acc, input| acc.checked_add(input.value))
    }

    /// Sum of outputs, `None` on overflow
    pub fn total_out(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(0u128, |acc, output| acc.checked_add(output.value))
    }

    /// Output paid to `destination`, if any
    pub fn output_to(&self, destination: &Address) -> Option<Amount> {
        self.outputs
            .iter()
            .find(|o| &o.destination == destination)
            .map(|o| o.value)
    }

    /// Input paid by `source`, if any
    pub fn input_from(&self, source: &Address) -> Option<Amount> {
        self.inputs
            .iter()
            .find(|i| &i.source == source)
            .map(|i| i.value)
    }

    /// Transaction hash
    pub fn hash(&self) -> H256 {
        let mut hasher = Keccak::new();
        hasher
            .update([self.version])
            .update(self.origin.as_bytes())
            .update((self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            hasher
                .update(input.source.as_bytes())
                .update(input.value.to_le_bytes());
        }
        hasher.update((self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            hasher
                .update(output.destination.as_bytes())
                .update(output.value.to_le_bytes());
        }
        hasher.finalize()
    }
}
