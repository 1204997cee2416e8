//! Content fingerprints that stakes are posted against.
//!
//! A [`PostReference`] is an opaque 32-byte hash. Callers may submit it in
//! any letter case; the ledger stores and emits the canonical lowercase
//! `0x`-prefixed form so two spellings of the same hash compare equal.

use crate::identity::{decode_fixed, ParseError};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Byte width of a [`PostReference`].
pub const REFERENCE_LENGTH: usize = 32;

/// Canonical fixed-width content fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostReference([u8; REFERENCE_LENGTH]);

impl PostReference {
    /// Wraps raw fingerprint bytes.
    pub const fn from_bytes(bytes: [u8; REFERENCE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Fingerprints arbitrary content with Keccak-256.
    pub fn from_content(content: &[u8]) -> Self {
        Self(Keccak256::digest(content).into())
    }

    /// Returns the raw fingerprint bytes.
    pub fn as_bytes(&self) -> &[u8; REFERENCE_LENGTH] {
        &self.0
    }
}

impl FromStr for PostReference {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<REFERENCE_LENGTH>(s).map(Self)
    }
}

impl TryFrom<String> for PostReference {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PostReference> for String {
    fn from(value: PostReference) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostReference({self})")
    }
}
