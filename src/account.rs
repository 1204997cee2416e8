//! Lifecycle of a single stake.
//!
//! A record is created `Locked` and moves to `Exited` exactly once, when its
//! owner exits after the hold period. There is no way back to `Locked`; a
//! participant who wants to stake again gets a fresh record in a new slot.

use crate::clock::Timestamp;
use crate::error::LedgerError;
use crate::fee::FeeConfig;
use crate::identity::Identity;
use crate::ledger::{Post, Slot};
use crate::transfer::{Amount, Payout};
use serde::{Deserialize, Serialize};

/// State of a stake record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostState {
    /// Value is held by the ledger.
    Locked,
    /// Value was released. Terminal.
    Exited,
}

/// Amounts an exit would move, computed before anything is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitQuote {
    /// Slot being closed.
    pub slot: Slot,
    /// Participant receiving the payout.
    pub participant: Identity,
    /// Stake minus fee.
    pub payout: Amount,
    /// Fee retained for the collector.
    pub fee: Amount,
    /// Fee recipient at quote time.
    pub collector: Identity,
    /// Time the exit was evaluated at.
    pub at: Timestamp,
}

impl ExitQuote {
    /// Transfer batch settling this exit. Zero-value legs are omitted.
    pub fn payouts(&self) -> Vec<Payout> {
        [
            Payout {
                recipient: self.participant,
                amount: self.payout,
            },
            Payout {
                recipient: self.collector,
                amount: self.fee,
            },
        ]
        .into_iter()
        .filter(|payout| payout.amount > 0)
        .collect()
    }
}

/// Exclusive handle on a locked record.
#[derive(Debug)]
pub struct StakeAccount<'a> {
    slot: Slot,
    post: &'a mut Post,
}

impl<'a> StakeAccount<'a> {
    /// Opens the record at `slot`; fails with `NoActiveStake` unless it is locked.
    pub fn open(slot: Slot, post: &'a mut Post) -> Result<Self, LedgerError> {
        if post.state() != PostState::Locked {
            return Err(LedgerError::NoActiveStake);
        }
        Ok(Self { slot, post })
    }

    /// Slot of the record.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Earliest time the stake may exit.
    pub fn unlocks_at(&self, hold_period: u64) -> Timestamp {
        self.post.timestamp().saturating_add(hold_period)
    }

    /// Prices an exit at `now` without changing anything.
    pub fn quote_exit(
        &self,
        now: Timestamp,
        hold_period: u64,
        fees: &FeeConfig,
    ) -> Result<ExitQuote, LedgerError> {
        let unlocks_at = self.unlocks_at(hold_period);
        if now < unlocks_at {
            return Err(LedgerError::StillLocked { unlocks_at, now });
        }
        let stake = self.post.stake();
        let fee = fees.compute_fee(stake);
        Ok(ExitQuote {
            slot: self.slot,
            participant: *self.post.participant(),
            payout: stake - fee,
            fee,
            collector: *fees.collector(),
            at: now,
        })
    }

    /// Moves the record to `Exited` according to `quote`.
    pub fn close(self, quote: &ExitQuote) {
        debug_assert_eq!(quote.slot, self.slot);
        self.post.mark_exited(quote.fee, quote.at);
    }
}
