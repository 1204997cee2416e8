//! Value-transfer collaborator.
//!
//! The ledger decides *what* moves; a [`ValueTransfer`] implementation moves
//! it. Collection pulls a stake into custody, release pays custody out to
//! one or more recipients. Both must be all-or-nothing: a failed call leaves
//! every balance as it was.

use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Smallest indivisible unit of value.
pub type Amount = u128;

/// One outgoing movement from custody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Receiving identity.
    pub recipient: Identity,
    /// Amount released.
    pub amount: Amount,
}

/// Errors reported by a value-transfer collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("insufficient funds for {account}: need {needed}, have {available}")]
    /// Payer cannot cover the collection.
    InsufficientFunds {
        /// Paying identity.
        account: Identity,
        /// Requested amount.
        needed: Amount,
        /// Spendable balance.
        available: Amount,
    },
    #[error("custody holds {available}, cannot release {needed}")]
    /// Release batch exceeds the value held in custody.
    InsufficientCustody {
        /// Total of the release batch.
        needed: Amount,
        /// Value in custody.
        available: Amount,
    },
    #[error("balance overflow")]
    /// Crediting would overflow an account balance.
    Overflow,
    #[error("transfer rejected: {0}")]
    /// Implementation-specific refusal.
    Rejected(String),
}

/// Moves value into and out of ledger custody.
pub trait ValueTransfer: Send + Sync {
    /// Moves `amount` from `from` into custody.
    fn collect(&mut self, from: &Identity, amount: Amount) -> Result<(), TransferError>;

    /// Releases every payout in `batch` from custody, or none of them.
    fn release(&mut self, batch: &[Payout]) -> Result<(), TransferError>;

    /// Total value currently held in custody.
    fn custody(&self) -> Amount;
}

/// In-process vault tracking spendable balances and custody.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryVault {
    balances: HashMap<Identity, Amount>,
    custody: Amount,
}

impl InMemoryVault {
    /// Creates an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits external funds to `account`.
    pub fn fund(&mut self, account: Identity, amount: Amount) -> Result<(), TransferError> {
        let balance = self.balances.entry(account).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;
        Ok(())
    }

    /// Spendable balance of `account`.
    pub fn balance_of(&self, account: &Identity) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }
}

impl ValueTransfer for InMemoryVault {
    fn collect(&mut self, from: &Identity, amount: Amount) -> Result<(), TransferError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                account: *from,
                needed: amount,
                available,
            });
        }
        let custody = self
            .custody
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;
        self.balances.insert(*from, available - amount);
        self.custody = custody;
        Ok(())
    }

    fn release(&mut self, batch: &[Payout]) -> Result<(), TransferError> {
        let needed = batch
            .iter()
            .try_fold(0u128, |acc, payout| acc.checked_add(payout.amount))
            .ok_or(TransferError::Overflow)?;
        if needed > self.custody {
            return Err(TransferError::InsufficientCustody {
                needed,
                available: self.custody,
            });
        }
        // New balances of the recipients only; nothing is written until all fit.
        let mut staged: Vec<(Identity, Amount)> = Vec::with_capacity(batch.len());
        for payout in batch.iter().filter(|payout| payout.amount > 0) {
            let position = staged
                .iter()
                .position(|(recipient, _)| *recipient == payout.recipient);
            let balance = match position {
                Some(position) => &mut staged[position].1,
                None => {
                    staged.push((payout.recipient, self.balance_of(&payout.recipient)));
                    let last = staged.len() - 1;
                    &mut staged[last].1
                }
            };
            *balance = balance
                .checked_add(payout.amount)
                .ok_or(TransferError::Overflow)?;
        }
        self.balances.extend(staged);
        self.custody -= needed;
        Ok(())
    }

    fn custody(&self) -> Amount {
        self.custody
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> Identity {
        Identity::from_bytes([byte; 20])
    }

    #[test]
    fn collect_moves_balance_into_custody() {
        let mut vault = InMemoryVault::new();
        vault.fund(id(1), 10).unwrap();
        vault.collect(&id(1), 4).unwrap();
        assert_eq!(vault.balance_of(&id(1)), 6);
        assert_eq!(vault.custody(), 4);
    }

    #[test]
    fn collect_without_funds_changes_nothing() {
        let mut vault = InMemoryVault::new();
        vault.fund(id(1), 3).unwrap();
        let err = vault.collect(&id(1), 4).unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientFunds {
                account: id(1),
                needed: 4,
                available: 3
            }
        );
        assert_eq!(vault.balance_of(&id(1)), 3);
        assert_eq!(vault.custody(), 0);
    }

    #[test]
    fn release_pays_every_recipient() {
        let mut vault = InMemoryVault::new();
        vault.fund(id(1), 100).unwrap();
        vault.collect(&id(1), 100).unwrap();
        vault
            .release(&[
                Payout {
                    recipient: id(1),
                    amount: 99,
                },
                Payout {
                    recipient: id(2),
                    amount: 1,
                },
            ])
            .unwrap();
        assert_eq!(vault.balance_of(&id(1)), 99);
        assert_eq!(vault.balance_of(&id(2)), 1);
        assert_eq!(vault.custody(), 0);
    }

    #[test]
    fn repeated_recipient_sums_its_legs() {
        let mut vault = InMemoryVault::new();
        vault.fund(id(1), 10).unwrap();
        vault.collect(&id(1), 10).unwrap();
        vault.fund(id(2), 1).unwrap();
        vault
            .release(&[
                Payout {
                    recipient: id(2),
                    amount: 4,
                },
                Payout {
                    recipient: id(2),
                    amount: 6,
                },
            ])
            .unwrap();
        assert_eq!(vault.balance_of(&id(2)), 11);
        assert_eq!(vault.custody(), 0);
    }

    #[test]
    fn overflowing_credit_leaves_every_balance() {
        let mut vault = InMemoryVault::new();
        vault.fund(id(1), 10).unwrap();
        vault.collect(&id(1), 10).unwrap();
        vault.fund(id(2), Amount::MAX).unwrap();
        let before = vault.clone();
        let err = vault
            .release(&[
                Payout {
                    recipient: id(1),
                    amount: 5,
                },
                Payout {
                    recipient: id(2),
                    amount: 5,
                },
            ])
            .unwrap_err();
        assert_eq!(err, TransferError::Overflow);
        assert_eq!(vault, before);
    }

    #[test]
    fn oversized_release_is_rejected_whole() {
        let mut vault = InMemoryVault::new();
        vault.fund(id(1), 5).unwrap();
        vault.collect(&id(1), 5).unwrap();
        let before = vault.clone();
        let err = vault
            .release(&[
                Payout {
                    recipient: id(1),
                    amount: 5,
                },
                Payout {
                    recipient: id(2),
                    amount: 1,
                },
            ])
            .unwrap_err();
        assert!(matches!(err, TransferError::InsufficientCustody { .. }));
        assert_eq!(vault, before);
    }
}
