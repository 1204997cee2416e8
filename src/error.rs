//! Error kinds surfaced by ledger operations.

use crate::clock::Timestamp;
use crate::transfer::TransferError;
use thiserror::Error;

/// Failure of a ledger operation. Every failure leaves the ledger unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("caller is not the administrator")]
    /// Administrative operation attempted by a non-administrator.
    Unauthorized,
    #[error("fee rate {rate} exceeds maximum {max}")]
    /// Fee update above [`MAX_RATE`](crate::fee::MAX_RATE).
    RateTooHigh {
        /// Rejected rate.
        rate: u32,
        /// Largest accepted rate.
        max: u32,
    },
    #[error("fee collector cannot be the zero identity")]
    /// Collector update to the null identity.
    InvalidCollector,
    #[error("owner cannot be the zero identity")]
    /// Ownership transfer to the null identity.
    InvalidOwner,
    #[error("stake amount must be positive")]
    /// Zero-value stake.
    InvalidStake,
    #[error("participant already holds an active stake")]
    /// Participant already holds a locked record.
    AlreadyStaked,
    #[error("participant has no active stake")]
    /// Exit or lookup-dependent call for a participant without a locked record.
    NoActiveStake,
    #[error("stake is locked until {unlocks_at} (now {now})")]
    /// Exit attempted before the hold period elapsed.
    StillLocked {
        /// Earliest timestamp at which exit succeeds.
        unlocks_at: Timestamp,
        /// Timestamp the exit was evaluated at.
        now: Timestamp,
    },
    #[error("value transfer failed: {0}")]
    /// The value-transfer collaborator rejected the movement of funds.
    TransferFailed(#[from] TransferError),
}

impl LedgerError {
    /// Returns true when resubmitting the same call later may succeed.
    ///
    /// `StillLocked` clears once the hold period passes and a transfer
    /// failure may be transient; every other kind is terminal for the call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StillLocked { .. } | Self::TransferFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timing_and_transfer_failures_are_retryable() {
        assert!(LedgerError::StillLocked {
            unlocks_at: 10,
            now: 5
        }
        .is_retryable());
        assert!(LedgerError::TransferFailed(TransferError::Rejected("offline".into())).is_retryable());
        assert!(!LedgerError::Unauthorized.is_retryable());
        assert!(!LedgerError::NoActiveStake.is_retryable());
        assert!(!LedgerError::RateTooHigh { rate: 1, max: 0 }.is_retryable());
    }

    #[test]
    fn messages_name_the_limits() {
        let err = LedgerError::RateTooHigh {
            rate: 100_000,
            max: 1_000,
        };
        assert_eq!(err.to_string(), "fee rate 100000 exceeds maximum 1000");
    }
}
