//! Committed state

use crate::changes::ChangeSet;
use crate::error::{StateError, StateResult};
use crate::traits::{Account, StateReader, Tracked};
use crate::view::StateView;
use parking_lot::RwLock;
use quill_crypto::Keccak;
use quill_primitives::{Address, Amount, H256};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Committed {
    accounts: BTreeMap<Address, Account>,
    storage: BTreeMap<(Address, Vec<u8>), Vec<u8>>,
    /// Commits that touched each account or its storage
    versions: BTreeMap<Address, u64>,
}

impl Committed {
    fn version(&self, address: &Address) -> u64 {
        self.versions.get(address).copied().unwrap_or(0)
    }
}

/// Root state repository.
///
/// Any number of views may be open on it at once; they never observe each
/// other's pending writes. Commits are serialized by the write lock, and a
/// commit is refused with [`StateError::Conflict`] when a sibling committed
/// first to an account the view had read.
#[derive(Debug, Default)]
pub struct StateRepository {
    inner: RwLock<Committed>,
}

impl StateRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository seeded with plain accounts
    pub fn with_balances(balances: impl IntoIterator<Item = (Address, Amount)>) -> Self {
        let accounts = balances
            .into_iter()
            .map(|(address, balance)| (address, Account::with_balance(balance)))
            .collect();
        Self {
            inner: RwLock::new(Committed {
                accounts,
                ..Committed::default()
            }),
        }
    }

    /// Open a view on committed state
    pub fn start_tracking(&self) -> StateView<'_> {
        StateView::on_root(self)
    }

    /// Number of accounts
    pub fn account_count(&self) -> usize {
        self.inner.read().accounts.len()
    }

    /// Number of non-empty storage slots
    pub fn storage_count(&self) -> usize {
        self.inner.read().storage.len()
    }

    /// Number of commits that changed `address` or its storage
    pub fn version(&self, address: &Address) -> u64 {
        self.inner.read().version(address)
    }

    /// Digest of every account and storage slot, in address/key order
    pub fn state_root(&self) -> H256 {
        let state = self.inner.read();
        let mut hasher = Keccak::new();

        hasher.update((state.accounts.len() as u64).to_le_bytes());
        for (address, account) in &state.accounts {
            hasher
                .update(address.as_bytes())
                .update(account.balance.to_le_bytes())
                .update_prefixed(&account.code);
        }

        hasher.update((state.storage.len() as u64).to_le_bytes());
        for ((address, key), value) in &state.storage {
            hasher
                .update(address.as_bytes())
                .update_prefixed(key)
                .update_prefixed(value);
        }

        hasher.finalize()
    }

    /// Account and the version it was read at
    pub(crate) fn read_account(&self, address: &Address) -> (Option<Account>, u64) {
        let state = self.inner.read();
        (state.accounts.get(address).cloned(), state.version(address))
    }

    /// Storage slot and the owning account's version
    pub(crate) fn read_storage(&self, address: &Address, key: &[u8]) -> (Option<Vec<u8>>, u64) {
        let state = self.inner.read();
        (
            state.storage.get(&(*address, key.to_vec())).cloned(),
            state.version(address),
        )
    }

    /// Apply a root-level commit. Transfer records end here.
    ///
    /// `reads` holds the version of every account the view read from this
    /// repository; any that moved since rejects the whole commit.
    pub(crate) fn apply(
        &self,
        changes: ChangeSet,
        reads: &BTreeMap<Address, u64>,
    ) -> StateResult<()> {
        let mut state = self.inner.write();
        if let Some((address, seen)) = reads
            .iter()
            .find(|(address, seen)| state.version(address) != **seen)
        {
            warn!(
                %address,
                seen,
                current = state.version(address),
                "Rejected commit over a stale read"
            );
            return Err(StateError::Conflict(*address));
        }

        let accounts = changes.accounts.len();
        let slots = changes.storage.len();

        for address in changes.accounts.keys() {
            *state.versions.entry(*address).or_insert(0) += 1;
        }
        state.accounts.extend(changes.accounts);
        for (slot, value) in changes.storage {
            match value {
                Some(value) => {
                    state.storage.insert(slot, value);
                }
                None => {
                    state.storage.remove(&slot);
                }
            }
        }

        debug!(accounts, slots, "Committed view to repository");
        Ok(())
    }
}

impl StateReader for StateRepository {
    fn get_account(&self, address: &Address) -> Option<Account> {
        self.inner.read().accounts.get(address).cloned()
    }

    fn get_storage(&self, address: &Address, key: &[u8]) -> Option<Vec<u8>> {
        self.inner
            .read()
            .storage
            .get(&(*address, key.to_vec()))
            .cloned()
    }
}

impl Tracked for StateRepository {
    fn start_tracking(&mut self) -> StateView<'_> {
        StateView::on_root(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    // ==================== Read tests ====================

    #[test]
    fn test_empty_repository() {
        let repo = StateRepository::new();
        assert!(repo.get_account(&addr(1)).is_none());
        assert_eq!(repo.get_balance(&addr(1)), 0);
        assert!(repo.get_code(&addr(1)).is_empty());
        assert_eq!(repo.get_storage(&addr(1), b"k"), None);
    }

    #[test]
    fn test_with_balances() {
        let repo = StateRepository::with_balances([(addr(1), 50), (addr(2), 7)]);
        assert_eq!(repo.get_balance(&addr(1)), 50);
        assert_eq!(repo.get_balance(&addr(2)), 7);
        assert_eq!(repo.account_count(), 2);
    }

    #[test]
    fn test_version_counts_commits() {
        let repo = StateRepository::with_balances([(addr(1), 1)]);
        assert_eq!(repo.version(&addr(1)), 0);

        let mut view = repo.start_tracking();
        view.set_storage(addr(1), b"k", b"v");
        view.commit().unwrap();
        assert_eq!(repo.version(&addr(1)), 1);
        assert_eq!(repo.version(&addr(2)), 0);

        repo.start_tracking().rollback();
        assert_eq!(repo.version(&addr(1)), 1);
    }

    // ==================== State root tests ====================

    #[test]
    fn test_state_root_is_order_independent_of_insertion() {
        let a = StateRepository::with_balances([(addr(1), 1), (addr(2), 2)]);
        let b = StateRepository::with_balances([(addr(2), 2), (addr(1), 1)]);
        assert_eq!(a.state_root(), b.state_root());
    }

    #[test]
    fn test_state_root_changes_on_commit() {
        let repo = StateRepository::with_balances([(addr(1), 1)]);
        let before = repo.state_root();

        let mut view = repo.start_tracking();
        view.set_storage(addr(1), b"k", b"v");
        view.commit().unwrap();

        assert_ne!(repo.state_root(), before);
        assert_eq!(repo.storage_count(), 1);
    }

    #[test]
    fn test_clearing_slot_restores_root() {
        let repo = StateRepository::with_balances([(addr(1), 1)]);
        let initial = repo.state_root();

        let mut view = repo.start_tracking();
        view.set_storage(addr(1), b"k", b"v");
        view.commit().unwrap();
        let with_slot = repo.state_root();

        let mut view = repo.start_tracking();
        view.set_storage(addr(1), b"k", b"");
        view.commit().unwrap();

        assert_ne!(repo.state_root(), with_slot);
        assert_eq!(repo.state_root(), initial);
        assert_eq!(repo.storage_count(), 0);
    }
}
