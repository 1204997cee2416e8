//! Thread-safe handle around a [`StakePost`].
//!
//! Writers hold the write lock for the whole operation, so no partial
//! effect is ever observable. Readers share the read lock and always see
//! the state between two complete operations.

use crate::account::ExitQuote;
use crate::clock::{Clock, Timestamp};
use crate::error::LedgerError;
use crate::events::NotificationSink;
use crate::identity::Identity;
use crate::ledger::{Post, Slot};
use crate::reference::PostReference;
use crate::snapshot::LedgerSnapshot;
use crate::stake_post::StakePost;
use crate::transfer::{Amount, ValueTransfer};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;

/// Cloneable, lock-guarded ledger handle.
#[derive(Debug)]
pub struct SharedLedger<C, V, S> {
    inner: Arc<RwLock<StakePost<C, V, S>>>,
}

impl<C, V, S> Clone for SharedLedger<C, V, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, V, S> SharedLedger<C, V, S>
where
    C: Clock,
    V: ValueTransfer,
    S: NotificationSink,
{
    /// Wraps `ledger`.
    pub fn new(ledger: StakePost<C, V, S>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    /// See [`StakePost::stake_and_post`].
    pub fn stake_and_post(
        &self,
        participant: Identity,
        reference: PostReference,
        amount: Amount,
    ) -> Result<Slot, LedgerError> {
        self.inner
            .write()
            .stake_and_post(participant, reference, amount)
    }

    /// See [`StakePost::exit`].
    pub fn exit(&self, participant: &Identity) -> Result<ExitQuote, LedgerError> {
        self.inner.write().exit(participant)
    }

    /// See [`StakePost::exit_at`].
    pub fn exit_at(&self, participant: &Identity, now: Timestamp) -> Result<ExitQuote, LedgerError> {
        self.inner.write().exit_at(participant, now)
    }

    /// See [`StakePost::set_fee_rate`].
    pub fn set_fee_rate(&self, caller: &Identity, rate: u32) -> Result<(), LedgerError> {
        self.inner.write().set_fee_rate(caller, rate)
    }

    /// See [`StakePost::set_fee_collector`].
    pub fn set_fee_collector(&self, caller: &Identity, collector: Identity) -> Result<(), LedgerError> {
        self.inner.write().set_fee_collector(caller, collector)
    }

    /// See [`StakePost::transfer_ownership`].
    pub fn transfer_ownership(&self, caller: &Identity, new_owner: Identity) -> Result<(), LedgerError> {
        self.inner.write().transfer_ownership(caller, new_owner)
    }

    /// See [`StakePost::get_index_by_user`].
    pub fn get_index_by_user(&self, participant: &Identity) -> Option<Slot> {
        self.inner.read().get_index_by_user(participant)
    }

    /// Copy of the record at `slot`.
    pub fn post(&self, slot: Slot) -> Option<Post> {
        self.inner.read().post(slot).cloned()
    }

    /// Current fee rate.
    pub fn fee_rate(&self) -> u32 {
        self.inner.read().fee_rate()
    }

    /// Current fee collector.
    pub fn fee_collector(&self) -> Identity {
        *self.inner.read().fee_collector()
    }

    /// Consistent copy of the persistent state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.read().snapshot()
    }

    /// Read access to the whole ledger for several queries against one state.
    pub fn read(&self) -> RwLockReadGuard<'_, StakePost<C, V, S>> {
        self.inner.read()
    }

    /// Runs `f` with exclusive access, e.g. to fund vault accounts.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut StakePost<C, V, S>) -> R) -> R {
        f(&mut self.inner.write())
    }
}
