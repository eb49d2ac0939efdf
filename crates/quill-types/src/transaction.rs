//! Contract transactions
//!
//! A contract transaction rides inside a chain transaction (the *carrier*).
//! `carrier_hash` and `output_index` identify it uniquely, which is what makes
//! the address of a newly created contract reproducible on every node.

use crate::value::Value;
use quill_crypto::{
    contract_address, public_key_to_address, recover_public_key, CryptoError, Keccak, Signature,
};
use quill_primitives::{Address, Amount, BlockNumber, Gas, H256};

/// What a contract transaction asks for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractTxKind {
    /// Deploy `code` and run its initializer with `parameters`
    Create {
        /// Raw module bytes
        code: Vec<u8>,
        /// Initializer arguments
        parameters: Vec<Value>,
    },
    /// Run `method` on the contract at `to`
    Call {
        /// Target contract
        to: Address,
        /// Method name
        method: String,
        /// Method arguments
        parameters: Vec<Value>,
    },
}

/// A parsed contract transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractTransaction {
    /// Hash of the chain transaction carrying this request
    pub carrier_hash: H256,
    /// Output of the carrier holding this request
    pub output_index: u32,
    /// Signer of the request
    pub sender: Address,
    /// Coins handed to the contract
    pub value: Amount,
    /// Gas limit
    pub gas_limit: Gas,
    /// Fee per gas unit
    pub gas_price: Amount,
    /// Create or Call
    pub kind: ContractTxKind,
}

impl ContractTransaction {
    /// Create request with no value attached
    pub fn create(carrier_hash: H256, code: Vec<u8>, gas_limit: Gas) -> Self {
        Self {
            carrier_hash,
            output_index: 0,
            sender: Address::ZERO,
            value: 0,
            gas_limit,
            gas_price: 1,
            kind: ContractTxKind::Create {
                code,
                parameters: Vec::new(),
            },
        }
    }

    /// Call request with no value attached
    pub fn call(carrier_hash: H256, to: Address, method: &str, gas_limit: Gas) -> Self {
        Self {
            carrier_hash,
            output_index: 0,
            sender: Address::ZERO,
            value: 0,
            gas_limit,
            gas_price: 1,
            kind: ContractTxKind::Call {
                to,
                method: method.to_string(),
                parameters: Vec::new(),
            },
        }
    }

    /// Set the sender
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = sender;
        self
    }

    /// Set the attached value
    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }

    /// Set the gas price
    pub fn with_gas_price(mut self, gas_price: Amount) -> Self {
        self.gas_price = gas_price;
        self
    }

    /// Replace the parameters of either kind
    pub fn with_parameters(mut self, params: Vec<Value>) -> Self {
        match &mut self.kind {
            ContractTxKind::Create { parameters, .. } => *parameters = params,
            ContractTxKind::Call { parameters, .. } => *parameters = params,
        }
        self
    }

    /// Check if this is a contract creation
    pub fn is_create(&self) -> bool {
        matches!(self.kind, ContractTxKind::Create { .. })
    }

    /// Method or initializer arguments
    pub fn parameters(&self) -> &[Value] {
        match &self.kind {
            ContractTxKind::Create { parameters, .. } => parameters,
            ContractTxKind::Call { parameters, .. } => parameters,
        }
    }

    /// Address the contract will be deployed at (Create only)
    pub fn new_contract_address(&self) -> Address {
        contract_address(&self.carrier_hash, self.output_index)
    }

    /// Upper bound on the fee: `gas_limit * gas_price`, saturating
    pub fn max_fee(&self) -> Amount {
        Amount::from(self.gas_limit).saturating_mul(self.gas_price)
    }

    /// Hash the sender signs. Covers every field except `sender`.
    pub fn signing_hash(&self) -> H256 {
        let mut hasher = Keccak::new();
        hasher
            .update(self.carrier_hash.as_bytes())
            .update(self.output_index.to_le_bytes())
            .update(self.value.to_le_bytes())
            .update(self.gas_limit.to_le_bytes())
            .update(self.gas_price.to_le_bytes());
        match &self.kind {
            ContractTxKind::Create { code, parameters } => {
                hasher
                    .update([0u8])
                    .update_prefixed(code)
                    .update(Value::encode_list(parameters));
            }
            ContractTxKind::Call {
                to,
                method,
                parameters,
            } => {
                hasher
                    .update([1u8])
                    .update(to.as_bytes())
                    .update_prefixed(method.as_bytes())
                    .update(Value::encode_list(parameters));
            }
        }
        hasher.finalize()
    }

    /// Fill `sender` by recovering the signer of `unsigned`
    pub fn from_signed(mut unsigned: Self, signature: &Signature) -> Result<Self, CryptoError> {
        let public_key = recover_public_key(&unsigned.signing_hash(), signature)?;
        unsigned.sender = public_key_to_address(&public_key);
        Ok(unsigned)
    }
}

/// Block-level environment supplied by the block template
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockContext {
    /// Height of the block being assembled
    pub number: BlockNumber,
    /// Block difficulty
    pub difficulty: u128,
    /// Miner reward address
    pub coinbase: Address,
}

impl BlockContext {
    /// Create a block context
    pub fn new(number: BlockNumber, difficulty: u128, coinbase: Address) -> Self {
        Self {
            number,
            difficulty,
            coinbase,
        }
    }
}
