//! Account data and state access traits

use crate::view::StateView;
use quill_primitives::{Address, Amount};

/// Account data
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    /// Account balance
    pub balance: Amount,
    /// Contract code (empty for plain accounts)
    pub code: Vec<u8>,
}

impl Account {
    /// Account holding `balance` and no code
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance,
            code: Vec::new(),
        }
    }

    /// Check if account has code
    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    /// Check if account is empty (no balance, no code)
    pub fn is_empty(&self) -> bool {
        self.balance == 0 && self.code.is_empty()
    }
}

/// Read access to state
pub trait StateReader {
    /// Get account by address
    fn get_account(&self, address: &Address) -> Option<Account>;

    /// Get storage value; `None` when the slot was never written or was cleared
    fn get_storage(&self, address: &Address, key: &[u8]) -> Option<Vec<u8>>;

    /// Check if account exists
    fn account_exists(&self, address: &Address) -> bool {
        self.get_account(address).is_some()
    }

    /// Get account balance
    fn get_balance(&self, address: &Address) -> Amount {
        self.get_account(address).map(|a| a.balance).unwrap_or(0)
    }

    /// Get account code
    fn get_code(&self, address: &Address) -> Vec<u8> {
        self.get_account(address).map(|a| a.code).unwrap_or_default()
    }
}

/// State a tracked view can be opened on.
///
/// Implemented by the repository (the view commits into committed state)
/// and by views (the child commits into its parent).
pub trait Tracked: StateReader {
    /// Open a view whose writes stay invisible until it is committed
    fn start_tracking(&mut self) -> StateView<'_>;
}
