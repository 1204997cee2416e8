//! Time sources consumed by the ledger.
//!
//! The ledger never advances time itself; it asks a [`Clock`] for the
//! current timestamp when a stake is created and when an exit is evaluated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Errors raised when resuming a persisted clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("timestamp {requested} is earlier than the last recorded time {last_seen}")]
    /// The requested start lies before time already observed by the ledger.
    Backdated {
        /// Requested start.
        requested: Timestamp,
        /// Latest time previously observed.
        last_seen: Timestamp,
    },
}

/// Monotonically non-decreasing source of timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time, clamped so it never runs backwards.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    /// Creates a system clock.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let previous = self.last.fetch_max(wall, Ordering::SeqCst);
        previous.max(wall)
    }
}

/// Manually driven clock. Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock starting at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Resumes a clock whose previous run last observed `last_seen`.
    ///
    /// An explicit `requested` start earlier than `last_seen` is rejected.
    /// Without one, the clock starts at wall-clock time, clamped to
    /// `last_seen`.
    pub fn resume(last_seen: Timestamp, requested: Option<Timestamp>) -> Result<Self, ClockError> {
        let start = match requested {
            Some(requested) if requested < last_seen => {
                return Err(ClockError::Backdated {
                    requested,
                    last_seen,
                })
            }
            Some(requested) => requested,
            None => SystemClock::new().now().max(last_seen),
        };
        Ok(Self::new(start))
    }

    /// Moves time forward by `secs`.
    pub fn advance(&self, secs: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(secs))
            });
    }

    /// Moves time to `to`; earlier values are ignored.
    pub fn set(&self, to: Timestamp) {
        self.now.fetch_max(to, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
