//! Pending writes of one tracked view

use crate::traits::Account;
use quill_primitives::{Address, Amount};
use quill_types::TransferRecord;
use std::collections::BTreeMap;

/// Writes and transfer records accumulated by a view
#[derive(Debug, Default)]
pub(crate) struct ChangeSet {
    /// Full account overrides (copy-on-write)
    pub accounts: BTreeMap<Address, Account>,
    /// Storage writes (`None` = slot cleared)
    pub storage: BTreeMap<(Address, Vec<u8>), Option<Vec<u8>>>,
    /// Transfers in emission order
    pub transfers: Vec<TransferRecord>,
    /// Balance of each account when this view first moved value for it
    pub opening: BTreeMap<Address, Amount>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.storage.is_empty() && self.transfers.is_empty()
    }

    /// Fold a committed child into this set
    pub fn merge(&mut self, child: ChangeSet) {
        self.accounts.extend(child.accounts);
        self.storage.extend(child.storage);
        self.transfers.extend(child.transfers);
        for (address, balance) in child.opening {
            self.opening.entry(address).or_insert(balance);
        }
    }
}
