//! Notifications emitted at the point a state change commits.

use crate::identity::Identity;
use crate::ledger::Slot;
use crate::reference::PostReference;
use crate::transfer::Amount;
use serde::{Deserialize, Serialize};

/// Observable ledger notification.
///
/// Externally tagged (`{"Exited": {..}}`): an internally tagged encoding
/// cannot decode amounts above `u64::MAX`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// Fee rate changed.
    FeeUpdated {
        /// New rate in basis points.
        rate: u32,
    },
    /// Fee collector changed.
    FeeCollectorUpdated {
        /// New collector.
        collector: Identity,
    },
    /// A stake was locked against a post.
    StakeAndPost {
        /// Depositor.
        participant: Identity,
        /// Amount locked.
        amount: Amount,
        /// Canonical post reference.
        reference: PostReference,
        /// Ledger slot of the new record.
        slot: Slot,
    },
    /// A stake was released.
    Exited {
        /// Former depositor.
        participant: Identity,
        /// Amount returned to the participant.
        payout: Amount,
        /// Amount paid to the fee collector.
        fee: Amount,
    },
    /// Administration moved to a new owner.
    OwnershipTransferred {
        /// Outgoing owner.
        previous: Identity,
        /// Incoming owner.
        owner: Identity,
    },
}

impl LedgerEvent {
    /// Short upper-case tag used in log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::FeeUpdated { .. } => "FEE_UPDATED",
            Self::FeeCollectorUpdated { .. } => "FEE_COLLECTOR_UPDATED",
            Self::StakeAndPost { .. } => "STAKE_AND_POST",
            Self::Exited { .. } => "EXITED",
            Self::OwnershipTransferred { .. } => "OWNERSHIP_TRANSFERRED",
        }
    }
}

/// Receives notifications synchronously as state changes commit.
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification.
    fn notify(&mut self, event: &LedgerEvent);
}

/// Sink that records every notification in memory.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far, oldest first.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Most recent notification.
    pub fn last(&self) -> Option<&LedgerEvent> {
        self.events.last()
    }

    /// Removes and returns every recorded notification.
    pub fn drain(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}

impl NotificationSink for EventLog {
    fn notify(&mut self, event: &LedgerEvent) {
        self.events.push(event.clone());
    }
}

/// Sink that only writes notifications to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&mut self, event: &LedgerEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(evt = event.tag(), %payload, "ledger notification"),
            Err(err) => tracing::error!(evt = event.tag(), %err, "failed to encode notification"),
        }
    }
}
