//! Append-only ledger of stake records.
//!
//! Every `stake_and_post` call appends exactly one [`Post`]. Records are
//! addressed by their [`Slot`], the zero-based position in the sequence;
//! slots are handed out in increasing order and never reused, so a slot is
//! a stable handle even after the stake it names has exited.

use crate::account::PostState;
use crate::clock::Timestamp;
use crate::identity::Identity;
use crate::reference::PostReference;
use crate::transfer::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel rendered for "no slot" on surfaces that need a plain integer.
pub const NO_SLOT: i64 = -1;

/// Position of a record in the [`PostLedger`]. Slot 0 is the first record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(u64);

impl Slot {
    /// Wraps a raw slot number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw slot number.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Signed rendering of an optional slot: the slot number, or [`NO_SLOT`].
    pub fn signed(lookup: Option<Slot>) -> i64 {
        lookup
            .and_then(|slot| i64::try_from(slot.0).ok())
            .unwrap_or(NO_SLOT)
    }

    fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stake locked against a post reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    participant: Identity,
    stake: Amount,
    reference: PostReference,
    timestamp: Timestamp,
    state: PostState,
    #[serde(default)]
    fee_paid: Amount,
    #[serde(default)]
    exited_at: Option<Timestamp>,
}

impl Post {
    pub(crate) fn locked(
        participant: Identity,
        stake: Amount,
        reference: PostReference,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            participant,
            stake,
            reference,
            timestamp,
            state: PostState::Locked,
            fee_paid: 0,
            exited_at: None,
        }
    }

    /// Depositor.
    pub fn participant(&self) -> &Identity {
        &self.participant
    }

    /// Value held by the record; reduced by the fee once the stake exits.
    pub fn stake(&self) -> Amount {
        self.stake
    }

    /// Canonical post reference.
    pub fn reference(&self) -> &PostReference {
        &self.reference
    }

    /// Creation time.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Lifecycle state.
    pub fn state(&self) -> PostState {
        self.state
    }

    /// Fee deducted at exit, zero while locked.
    pub fn fee_paid(&self) -> Amount {
        self.fee_paid
    }

    /// Exit time, if the stake has exited.
    pub fn exited_at(&self) -> Option<Timestamp> {
        self.exited_at
    }

    /// Amount originally staked.
    pub fn original_stake(&self) -> Amount {
        self.stake.saturating_add(self.fee_paid)
    }

    /// Latest time recorded by this post.
    pub fn last_activity(&self) -> Timestamp {
        self.exited_at.unwrap_or(self.timestamp).max(self.timestamp)
    }

    /// Checks that the exit fields agree with the lifecycle state.
    pub(crate) fn lifecycle_violation(&self) -> Option<&'static str> {
        match (self.state, self.exited_at) {
            (PostState::Locked, Some(_)) => Some("locked post has an exit time"),
            (PostState::Locked, None) if self.fee_paid != 0 => Some("locked post has a paid fee"),
            (PostState::Locked, None) => None,
            (PostState::Exited, None) => Some("exited post has no exit time"),
            (PostState::Exited, Some(at)) if at < self.timestamp => {
                Some("exited post left before it was created")
            }
            (PostState::Exited, Some(_)) => None,
        }
    }

    pub(crate) fn mark_exited(&mut self, fee: Amount, at: Timestamp) {
        self.stake -= fee;
        self.fee_paid = fee;
        self.exited_at = Some(at);
        self.state = PostState::Exited;
    }
}

/// Ordered sequence of every stake record ever created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostLedger {
    posts: Vec<Post>,
}

impl PostLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_posts(posts: Vec<Post>) -> Self {
        Self { posts }
    }

    /// Slot the next appended record will occupy.
    pub fn next_slot(&self) -> Slot {
        Slot(self.posts.len() as u64)
    }

    pub(crate) fn append(&mut self, post: Post) -> Slot {
        let slot = self.next_slot();
        self.posts.push(post);
        slot
    }

    /// Record at `slot`.
    pub fn get(&self, slot: Slot) -> Option<&Post> {
        slot.index().and_then(|index| self.posts.get(index))
    }

    pub(crate) fn get_mut(&mut self, slot: Slot) -> Option<&mut Post> {
        slot.index().and_then(move |index| self.posts.get_mut(index))
    }

    /// Every record, in slot order.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Records paired with their slots.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &Post)> {
        self.posts
            .iter()
            .enumerate()
            .map(|(index, post)| (Slot(index as u64), post))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// True when no stake was ever posted.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}
