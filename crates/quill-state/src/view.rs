//! Tracked state views
//!
//! A [`StateView`] buffers writes over a parent: either the committed
//! repository or another view. Reads fall through to the parent for
//! anything the view has not written itself.
//!
//! A view opened on the repository remembers the version of every account
//! it (or any view nested in it) read from committed state. Its commit is
//! refused if a sibling committed to one of those accounts in the meantime.
//!
//! ```text
//!  StateRepository  <-- apply() on commit
//!        ^
//!   StateView (transaction)   <-- absorb() on commit
//!        ^
//!   StateView (nested call)
//! ```
//!
//! `commit` and `rollback` consume the view, so a view can be closed at most
//! once. Dropping a view without committing discards it.

use crate::changes::ChangeSet;
use crate::error::{StateError, StateResult};
use crate::repository::StateRepository;
use crate::traits::{Account, StateReader, Tracked};
use parking_lot::Mutex;
use quill_primitives::{Address, Amount};
use quill_types::TransferRecord;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// A layer a child view can commit into
trait Layer: StateReader + Send {
    fn absorb(&mut self, changes: ChangeSet);
    fn depth(&self) -> usize;
}

enum Parent<'a> {
    Root(&'a StateRepository),
    View(&'a mut dyn Layer),
}

/// Isolated layer of pending writes
pub struct StateView<'a> {
    parent: Parent<'a>,
    changes: ChangeSet,
    /// Repository version of each account at first read (root-level only)
    reads: Mutex<BTreeMap<Address, u64>>,
    depth: usize,
}

impl<'a> StateView<'a> {
    pub(crate) fn on_root(root: &'a StateRepository) -> Self {
        trace!("Opened tracked view on repository");
        Self {
            parent: Parent::Root(root),
            changes: ChangeSet::default(),
            reads: Mutex::default(),
            depth: 1,
        }
    }

    fn on_view(parent: &'a mut dyn Layer) -> Self {
        let depth = parent.depth() + 1;
        trace!(depth, "Opened nested tracked view");
        Self {
            parent: Parent::View(parent),
            changes: ChangeSet::default(),
            reads: Mutex::default(),
            depth,
        }
    }

    /// Open a nested view on this one
    pub fn start_tracking(&mut self) -> StateView<'_> {
        StateView::on_view(self)
    }

    /// Nesting depth (1 for a view opened on the repository)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True if nothing was written or transferred
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Transfers recorded in this view, in emission order
    pub fn transfers(&self) -> &[TransferRecord] {
        &self.changes.transfers
    }

    /// Balance of each account the first time this view moved value for it
    pub fn opening_balances(&self) -> &BTreeMap<Address, Amount> {
        &self.changes.opening
    }

    // ==================== Writes ====================

    /// Create `address` if it does not exist.
    ///
    /// Fails with `CodeAlreadySet` when a contract already lives there.
    pub fn create_account(&mut self, address: Address) -> StateResult<()> {
        match self.get_account(&address) {
            Some(account) if account.has_code() => Err(StateError::CodeAlreadySet(address)),
            Some(_) => Ok(()),
            None => {
                self.changes.accounts.insert(address, Account::default());
                Ok(())
            }
        }
    }

    /// Deploy code. Code is set at most once per address.
    pub fn set_code(&mut self, address: Address, code: Vec<u8>) -> StateResult<()> {
        if code.is_empty() {
            return Err(StateError::EmptyCode(address));
        }
        let account = self.account_mut(address);
        if account.has_code() {
            return Err(StateError::CodeAlreadySet(address));
        }
        account.code = code;
        Ok(())
    }

    /// Write a storage slot; an empty value clears it
    pub fn set_storage(&mut self, address: Address, key: &[u8], value: &[u8]) {
        self.account_mut(address);
        let value = if value.is_empty() {
            None
        } else {
            Some(value.to_vec())
        };
        self.changes.storage.insert((address, key.to_vec()), value);
    }

    /// Credit an account
    pub fn add_balance(&mut self, address: Address, amount: Amount) -> StateResult<()> {
        let account = self.account_mut(address);
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(StateError::BalanceOverflow(address))?;
        Ok(())
    }

    /// Debit an account
    pub fn sub_balance(&mut self, address: Address, amount: Amount) -> StateResult<()> {
        let account = self.account_mut(address);
        if account.balance < amount {
            return Err(StateError::InsufficientFunds {
                account: address,
                required: amount,
                available: account.balance,
            });
        }
        account.balance -= amount;
        Ok(())
    }

    /// Move value between accounts and record it.
    ///
    /// Either both sides change or neither does. Zero amounts are not
    /// recorded.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> StateResult<()> {
        if amount == 0 {
            return Ok(());
        }

        let from_balance = self.get_balance(&from);
        let to_balance = self.get_balance(&to);
        if from_balance < amount {
            return Err(StateError::InsufficientFunds {
                account: from,
                required: amount,
                available: from_balance,
            });
        }
        if from != to && to_balance.checked_add(amount).is_none() {
            return Err(StateError::BalanceOverflow(to));
        }

        self.changes.opening.entry(from).or_insert(from_balance);
        self.changes.opening.entry(to).or_insert(to_balance);

        self.sub_balance(from, amount)?;
        self.add_balance(to, amount)?;
        self.changes
            .transfers
            .push(TransferRecord::new(from, to, amount));

        trace!(%from, %to, amount, "Recorded transfer");
        Ok(())
    }

    // ==================== Lifecycle ====================

    /// Make this view's writes visible to its parent.
    ///
    /// Folding into a parent view always succeeds. Committing into the
    /// repository fails with [`StateError::Conflict`] and applies nothing
    /// when a sibling has since committed to an account this view read.
    pub fn commit(self) -> StateResult<()> {
        let depth = self.depth;
        match self.parent {
            Parent::Root(root) => {
                debug!(
                    depth,
                    transfers = self.changes.transfers.len(),
                    "Committing tracked view"
                );
                root.apply(self.changes, &self.reads.into_inner())
            }
            Parent::View(parent) => {
                trace!(depth, "Folding nested view into parent");
                parent.absorb(self.changes);
                Ok(())
            }
        }
    }

    /// Discard this view's writes
    pub fn rollback(self) {
        debug!(
            depth = self.depth,
            accounts = self.changes.accounts.len(),
            slots = self.changes.storage.len(),
            transfers = self.changes.transfers.len(),
            "Rolled back tracked view"
        );
    }

    fn account_mut(&mut self, address: Address) -> &mut Account {
        if !self.changes.accounts.contains_key(&address) {
            let current = match &self.parent {
                Parent::Root(root) => self.read_root(root, &address),
                Parent::View(parent) => parent.get_account(&address),
            };
            self.changes
                .accounts
                .insert(address, current.unwrap_or_default());
        }
        self.changes.accounts.entry(address).or_default()
    }

    fn read_root(&self, root: &StateRepository, address: &Address) -> Option<Account> {
        let (account, version) = root.read_account(address);
        self.reads.lock().entry(*address).or_insert(version);
        account
    }
}

impl StateReader for StateView<'_> {
    fn get_account(&self, address: &Address) -> Option<Account> {
        if let Some(account) = self.changes.accounts.get(address) {
            return Some(account.clone());
        }
        match &self.parent {
            Parent::Root(root) => self.read_root(root, address),
            Parent::View(parent) => parent.get_account(address),
        }
    }

    fn get_storage(&self, address: &Address, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(slot) = self.changes.storage.get(&(*address, key.to_vec())) {
            return slot.clone();
        }
        match &self.parent {
            Parent::Root(root) => {
                let (slot, version) = root.read_storage(address, key);
                self.reads.lock().entry(*address).or_insert(version);
                slot
            }
            Parent::View(parent) => parent.get_storage(address, key),
        }
    }
}

impl Layer for StateView<'_> {
    fn absorb(&mut self, changes: ChangeSet) {
        self.changes.merge(changes);
    }

    fn depth(&self) -> usize {
        self.depth
    }
}

impl Tracked for StateView<'_> {
    fn start_tracking(&mut self) -> StateView<'_> {
        StateView::on_view(self)
    }
}
