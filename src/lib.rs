#![deny(missing_docs)]

//! # stake_post
//!
//! **stake_post** is the accounting core of a time-locked staking ledger.
//! A participant locks value against a content fingerprint (a *post*),
//! waits out a mandatory hold period, and exits, paying an
//! administrator-configured fee to a collector. The crate owns the
//! bookkeeping rules; moving real value, telling time, and delivering
//! notifications are delegated to collaborator traits.
//!
//! ## Components
//!
//! * **Fee configuration**: [`FeeConfig`] holds the rate (basis points,
//!   capped at [`MAX_RATE`]) and the collector, and computes the truncating
//!   fee for an exit.
//! * **Post ledger**: [`PostLedger`] is the append-only sequence of
//!   [`Post`] records, addressed by [`Slot`].
//! * **User index**: [`UserIndex`] maps a participant to the slot of their
//!   single locked stake in constant time.
//! * **Stake account**: [`StakeAccount`] drives the `Locked → Exited`
//!   transition of one record and prices the exit.
//! * **Ledger root**: [`StakePost`] composes the above with a [`Clock`], a
//!   [`ValueTransfer`] and a [`NotificationSink`]; [`SharedLedger`] and the
//!   `service` actor (feature `service`) make it safe to share.
//!
//! ## Usage
//!
//! ```rust
//! use stake_post::{
//!     EventLog, InMemoryVault, LedgerConfig, LedgerError, ManualClock, StakePost,
//! };
//!
//! let owner = "0x00000000000000000000000000000000000000aa".parse().unwrap();
//! let user = "0x0000000000000000000000000000000000000001".parse().unwrap();
//! let post = "0x7D5A99F603F231D53A4F39D1521F98D2E8BB279CF29BEBFD0687DC98458E7F89"
//!     .parse()
//!     .unwrap();
//!
//! let clock = ManualClock::new(1_700_000_000);
//! let mut vault = InMemoryVault::new();
//! vault.fund(user, 1_000).unwrap();
//!
//! let mut ledger = StakePost::new(
//!     owner,
//!     LedgerConfig::default(),
//!     clock.clone(),
//!     vault,
//!     EventLog::new(),
//! )
//! .unwrap();
//! ledger.set_fee_rate(&owner, 100).unwrap();
//!
//! let slot = ledger.stake_and_post(user, post, 1_000).unwrap();
//! assert_eq!(ledger.get_index_by_user(&user), Some(slot));
//! assert!(matches!(ledger.exit(&user), Err(LedgerError::StillLocked { .. })));
//!
//! clock.advance(ledger.hold_period());
//! let quote = ledger.exit(&user).unwrap();
//! assert_eq!((quote.payout, quote.fee), (990, 10));
//! assert_eq!(ledger.get_index_by_user(&user), None);
//! ```

pub mod account;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod fee;
pub mod identity;
pub mod index;
pub mod ledger;
pub mod reference;
#[cfg(feature = "service")]
pub mod service;
pub mod shared;
pub mod snapshot;
mod stake_post;
pub mod transfer;

pub use account::{ExitQuote, PostState, StakeAccount};
pub use auth::{authorize, AdminGrant, Authority, Ownership};
pub use clock::{Clock, ClockError, ManualClock, SystemClock, Timestamp};
pub use config::{ConfigError, LedgerConfig, DEFAULT_HOLD_PERIOD_SECS, HOLD_PERIOD_ENV};
pub use error::LedgerError;
pub use events::{EventLog, LedgerEvent, NotificationSink, TracingSink};
pub use fee::{FeeConfig, MAX_RATE, RATE_DENOMINATOR};
pub use identity::{Identity, ParseError};
pub use index::UserIndex;
pub use ledger::{Post, PostLedger, Slot, NO_SLOT};
pub use reference::PostReference;
#[cfg(feature = "service")]
pub use service::{LedgerHandle, ServiceError};
pub use shared::SharedLedger;
pub use snapshot::{state_root, LedgerSnapshot, SnapshotError, StateRoot};
pub use stake_post::StakePost;
pub use transfer::{Amount, InMemoryVault, Payout, TransferError, ValueTransfer};
