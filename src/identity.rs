//! Participant identities and the fixed-width hex codec shared with post references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Byte width of an [`Identity`].
pub const IDENTITY_LENGTH: usize = 20;

/// Errors raised while decoding hex-encoded identities or references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid hex: {0}")]
    /// Input contained characters outside `[0-9a-fA-F]`.
    InvalidHex(String),
    #[error("expected {expected} bytes, found {actual}")]
    /// Input decoded to the wrong number of bytes.
    InvalidLength {
        /// Byte width required by the target type.
        expected: usize,
        /// Byte width actually decoded.
        actual: usize,
    },
}

/// Decodes an optionally `0x`-prefixed, case-insensitive hex string into `N` bytes.
pub(crate) fn decode_fixed<const N: usize>(input: &str) -> Result<[u8; N], ParseError> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(body).map_err(|err| ParseError::InvalidHex(err.to_string()))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| ParseError::InvalidLength {
        expected: N,
        actual,
    })
}

/// Account identity of a participant, administrator, or fee collector.
///
/// Identities are 20-byte addresses rendered as lowercase `0x` hex. The
/// all-zero identity is the null identity and is never a valid collector or
/// owner.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity([u8; IDENTITY_LENGTH]);

impl Identity {
    /// The null identity.
    pub const ZERO: Identity = Identity([0u8; IDENTITY_LENGTH]);

    /// Wraps raw address bytes.
    pub const fn from_bytes(bytes: [u8; IDENTITY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LENGTH] {
        &self.0
    }

    /// Returns true for the null identity.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; IDENTITY_LENGTH]
    }
}

impl FromStr for Identity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<IDENTITY_LENGTH>(s).map(Self)
    }
}

impl TryFrom<String> for Identity {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}
