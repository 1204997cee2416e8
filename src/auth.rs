//! Administrator authorization.
//!
//! Administrative setters never consult ambient caller state. The caller's
//! identity is checked once against an [`Authority`], which mints an
//! [`AdminGrant`]; setters that change configuration require the grant.

use crate::error::LedgerError;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};

/// Decides which identities may perform administrative operations.
pub trait Authority {
    /// Returns true if `identity` is an administrator.
    fn is_administrator(&self, identity: &Identity) -> bool;
}

/// Proof that an administrator authorised the current call.
///
/// Only [`authorize`] constructs grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminGrant {
    admin: Identity,
}

impl AdminGrant {
    /// Administrator the grant was minted for.
    pub fn admin(&self) -> &Identity {
        &self.admin
    }
}

/// Checks `caller` against `authority` and mints a grant on success.
pub fn authorize<A>(authority: &A, caller: &Identity) -> Result<AdminGrant, LedgerError>
where
    A: Authority + ?Sized,
{
    if authority.is_administrator(caller) {
        Ok(AdminGrant { admin: *caller })
    } else {
        tracing::warn!(evt = "DENIED", caller = %caller, "administrative call rejected");
        Err(LedgerError::Unauthorized)
    }
}

/// Single-owner authority: the owner is the only administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    owner: Identity,
}

impl Ownership {
    /// Creates an ownership record for `owner`.
    pub fn new(owner: Identity) -> Result<Self, LedgerError> {
        if owner.is_zero() {
            return Err(LedgerError::InvalidOwner);
        }
        Ok(Self { owner })
    }

    /// Current owner.
    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    /// Hands ownership to `new_owner` and returns the previous owner.
    pub fn transfer(
        &mut self,
        grant: &AdminGrant,
        new_owner: Identity,
    ) -> Result<Identity, LedgerError> {
        if grant.admin() != &self.owner {
            return Err(LedgerError::Unauthorized);
        }
        if new_owner.is_zero() {
            return Err(LedgerError::InvalidOwner);
        }
        Ok(std::mem::replace(&mut self.owner, new_owner))
    }
}

impl Authority for Ownership {
    fn is_administrator(&self, identity: &Identity) -> bool {
        &self.owner == identity
    }
}

impl<F> Authority for F
where
    F: Fn(&Identity) -> bool,
{
    fn is_administrator(&self, identity: &Identity) -> bool {
        self(identity)
    }
}
