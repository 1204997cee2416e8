//! Participant → active slot index.

use crate::account::PostState;
use crate::error::LedgerError;
use crate::identity::Identity;
use crate::ledger::{PostLedger, Slot};
use std::collections::HashMap;

/// Maps each participant with a locked stake to the slot holding it.
///
/// A participant is present iff the slot it maps to is `Locked`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserIndex {
    slots: HashMap<Identity, Slot>,
}

impl UserIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the index from the locked records of `ledger`.
    pub fn rebuild(ledger: &PostLedger) -> Result<Self, LedgerError> {
        let mut index = Self::new();
        for (slot, post) in ledger.iter() {
            if post.state() == PostState::Locked {
                index.insert(*post.participant(), slot)?;
            }
        }
        Ok(index)
    }

    /// Active slot of `participant`.
    pub fn get(&self, participant: &Identity) -> Option<Slot> {
        self.slots.get(participant).copied()
    }

    /// True when `participant` holds a locked stake.
    pub fn contains(&self, participant: &Identity) -> bool {
        self.slots.contains_key(participant)
    }

    pub(crate) fn insert(&mut self, participant: Identity, slot: Slot) -> Result<(), LedgerError> {
        if self.slots.contains_key(&participant) {
            return Err(LedgerError::AlreadyStaked);
        }
        self.slots.insert(participant, slot);
        Ok(())
    }

    /// Records `participant` at `slot` once the caller has ruled out an
    /// existing entry.
    pub(crate) fn assign(&mut self, participant: Identity, slot: Slot) {
        let previous = self.slots.insert(participant, slot);
        debug_assert!(previous.is_none(), "participant indexed twice");
    }

    pub(crate) fn remove(&mut self, participant: &Identity) -> Option<Slot> {
        self.slots.remove(participant)
    }

    /// Number of participants with a locked stake.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no stake is locked.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
