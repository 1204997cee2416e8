//! Persistent ledger snapshots and the state root committing to them.
//!
//! A snapshot holds everything needed to rebuild a [`StakePost`]: owner, fee
//! configuration, hold period, and the full post sequence. The participant
//! index is derived data and is rebuilt on restore, so a snapshot can never
//! carry an index that disagrees with its records.
//!
//! The state root is a domain-separated BLAKE2b-256 Merkle root over one
//! leaf digest per post, in slot order.
//!
//! [`StakePost`]: crate::StakePost

use crate::account::PostState;
use crate::clock::Timestamp;
use crate::error::LedgerError;
use crate::fee::FeeConfig;
use crate::identity::Identity;
use crate::index::UserIndex;
use crate::ledger::{Post, PostLedger, Slot};
use blake2::digest::{consts::U32, Digest};
use blake2::Blake2b;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

const STATE_DOMAIN: &[u8] = b"STAKEPOST_STATE";
const LEAF_DOMAIN: &[u8] = b"stakepost-post-v1";

/// 32-byte commitment over a post sequence.
pub type StateRoot = [u8; 32];

type Blake2b256 = Blake2b<U32>;

/// Errors raised while persisting or restoring snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    /// Filesystem failure.
    Io(#[from] std::io::Error),
    #[error("snapshot decode error: {0}")]
    /// Malformed JSON.
    Decode(#[from] serde_json::Error),
    #[error("snapshot violates ledger invariant: {0}")]
    /// Snapshot content breaks a ledger invariant.
    Invalid(#[from] LedgerError),
    #[error("post at slot {slot} is inconsistent: {reason}")]
    /// A record's exit fields disagree with its lifecycle state.
    InconsistentPost {
        /// Offending slot.
        slot: Slot,
        /// Which rule the record breaks.
        reason: &'static str,
    },
    #[error("post at slot {slot} has zero stake")]
    /// A record was stored with nothing staked.
    EmptyPost {
        /// Offending slot.
        slot: Slot,
    },
}

/// Serializable ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Administrator.
    pub owner: Identity,
    /// Fee rate and collector.
    pub fees: FeeConfig,
    /// Hold period in seconds.
    pub hold_period_secs: u64,
    /// Every record in slot order.
    pub posts: Vec<Post>,
}

impl LedgerSnapshot {
    /// Checks the snapshot invariants and returns the rebuilt participant index.
    pub fn validate(&self) -> Result<UserIndex, SnapshotError> {
        if self.owner.is_zero() {
            return Err(LedgerError::InvalidOwner.into());
        }
        let ledger = PostLedger::from_posts(self.posts.clone());
        for (slot, post) in ledger.iter() {
            if let Some(reason) = post.lifecycle_violation() {
                return Err(SnapshotError::InconsistentPost { slot, reason });
            }
            if post.original_stake() == 0 {
                return Err(SnapshotError::EmptyPost { slot });
            }
        }
        Ok(UserIndex::rebuild(&ledger)?)
    }

    /// Latest time recorded by any post, or 0 for an empty ledger.
    pub fn latest_timestamp(&self) -> Timestamp {
        self.posts
            .iter()
            .map(Post::last_activity)
            .max()
            .unwrap_or_default()
    }

    /// Merkle root over the posts.
    pub fn state_root(&self) -> StateRoot {
        state_root(&self.posts)
    }

    /// Writes the snapshot as pretty JSON, replacing `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Reads and validates a snapshot from `path`.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let bytes = fs::read(path)?;
        let snapshot: Self = serde_json::from_slice(&bytes)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

fn leaf_digest(slot: u64, post: &Post) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(LEAF_DOMAIN);
    hasher.update(slot.to_be_bytes());
    hasher.update(post.participant().as_bytes());
    hasher.update(post.stake().to_be_bytes());
    hasher.update(post.reference().as_bytes());
    hasher.update(post.timestamp().to_be_bytes());
    hasher.update([match post.state() {
        PostState::Locked => 0u8,
        PostState::Exited => 1u8,
    }]);
    hasher.update(post.fee_paid().to_be_bytes());
    hasher.update(post.exited_at().unwrap_or_default().to_be_bytes());
    hasher.finalize().into()
}

fn hash_node(marker: u8, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(STATE_DOMAIN);
    hasher.update([marker]);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Merkle root over `posts`; an empty sequence has a fixed root.
pub fn state_root(posts: &[Post]) -> StateRoot {
    if posts.is_empty() {
        return hash_node(1, &[]);
    }
    let mut level: Vec<[u8; 32]> = posts
        .iter()
        .enumerate()
        .map(|(slot, post)| hash_node(0, &[leaf_digest(slot as u64, post).as_slice()]))
        .collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_node(2, &[left.as_slice(), right.as_slice()]),
                [single] => *single,
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }
    level[0]
}
