//! The ledger root.
//!
//! [`StakePost`] owns the fee configuration, the post ledger, the
//! participant index, and the collaborators it drives. Every mutating call
//! validates first, then moves value through the [`ValueTransfer`]
//! collaborator, and only then commits ledger state and emits its
//! notification. A failure at any step returns before anything is
//! committed.

use crate::account::{ExitQuote, StakeAccount};
use crate::auth::{authorize, Ownership};
use crate::clock::{Clock, Timestamp};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::events::{LedgerEvent, NotificationSink};
use crate::fee::FeeConfig;
use crate::identity::Identity;
use crate::index::UserIndex;
use crate::ledger::{Post, PostLedger, Slot};
use crate::reference::PostReference;
use crate::snapshot::{LedgerSnapshot, SnapshotError};
use crate::transfer::{Amount, ValueTransfer};
use tracing::{debug, info, warn};

/// Staking ledger bound to its clock, value-transfer, and notification collaborators.
#[derive(Debug)]
pub struct StakePost<C, V, S> {
    ownership: Ownership,
    fees: FeeConfig,
    ledger: PostLedger,
    index: UserIndex,
    hold_period: u64,
    clock: C,
    vault: V,
    sink: S,
}

impl<C, V, S> StakePost<C, V, S>
where
    C: Clock,
    V: ValueTransfer,
    S: NotificationSink,
{
    /// Creates an empty ledger administered by `owner`, who also collects fees.
    pub fn new(
        owner: Identity,
        config: LedgerConfig,
        clock: C,
        vault: V,
        sink: S,
    ) -> Result<Self, LedgerError> {
        let ownership = Ownership::new(owner)?;
        let fees = FeeConfig::new(owner)?;
        info!(
            evt = "INIT",
            owner = %owner,
            hold_period_secs = config.hold_period_secs,
            "ledger created"
        );
        Ok(Self {
            ownership,
            fees,
            ledger: PostLedger::new(),
            index: UserIndex::new(),
            hold_period: config.hold_period_secs,
            clock,
            vault,
            sink,
        })
    }

    /// Restores a ledger from a validated snapshot.
    pub fn from_snapshot(
        snapshot: LedgerSnapshot,
        clock: C,
        vault: V,
        sink: S,
    ) -> Result<Self, SnapshotError> {
        let index = snapshot.validate()?;
        let LedgerSnapshot {
            owner,
            fees,
            hold_period_secs,
            posts,
        } = snapshot;
        Ok(Self {
            ownership: Ownership::new(owner)?,
            fees,
            ledger: PostLedger::from_posts(posts),
            index,
            hold_period: hold_period_secs,
            clock,
            vault,
            sink,
        })
    }

    /// Point-in-time copy of the persistent ledger state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            owner: *self.ownership.owner(),
            fees: self.fees.clone(),
            hold_period_secs: self.hold_period,
            posts: self.ledger.posts().to_vec(),
        }
    }

    fn emit(&mut self, event: LedgerEvent) {
        self.sink.notify(&event);
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Sets the exit fee rate. Only the owner may call.
    pub fn set_fee_rate(&mut self, caller: &Identity, rate: u32) -> Result<(), LedgerError> {
        let grant = authorize(&self.ownership, caller)?;
        let event = self.fees.set_rate(&grant, rate).inspect_err(|err| {
            warn!(evt = "FEE_REJECTED", rate, %err);
        })?;
        info!(evt = "FEE_UPDATED", rate, "fee rate updated");
        self.emit(event);
        Ok(())
    }

    /// Sets the fee collector. Only the owner may call.
    pub fn set_fee_collector(
        &mut self,
        caller: &Identity,
        collector: Identity,
    ) -> Result<(), LedgerError> {
        let grant = authorize(&self.ownership, caller)?;
        let event = self.fees.set_collector(&grant, collector)?;
        info!(evt = "FEE_COLLECTOR_UPDATED", collector = %collector, "fee collector updated");
        self.emit(event);
        Ok(())
    }

    /// Hands administration to `new_owner`. The fee collector is unchanged.
    pub fn transfer_ownership(
        &mut self,
        caller: &Identity,
        new_owner: Identity,
    ) -> Result<(), LedgerError> {
        let grant = authorize(&self.ownership, caller)?;
        let previous = self.ownership.transfer(&grant, new_owner)?;
        info!(evt = "OWNERSHIP_TRANSFERRED", previous = %previous, owner = %new_owner);
        self.emit(LedgerEvent::OwnershipTransferred {
            previous,
            owner: new_owner,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Participant operations
    // ------------------------------------------------------------------

    /// Locks `amount` from `participant` against `reference` and returns the new slot.
    pub fn stake_and_post(
        &mut self,
        participant: Identity,
        reference: PostReference,
        amount: Amount,
    ) -> Result<Slot, LedgerError> {
        if amount == 0 {
            warn!(evt = "STAKE_REJECTED", participant = %participant, "zero stake");
            return Err(LedgerError::InvalidStake);
        }
        if self.index.contains(&participant) {
            warn!(evt = "STAKE_REJECTED", participant = %participant, "already staked");
            return Err(LedgerError::AlreadyStaked);
        }
        self.vault.collect(&participant, amount).inspect_err(|err| {
            warn!(evt = "STAKE_TRANSFER_FAILED", participant = %participant, %err);
        })?;

        let timestamp = self.clock.now();
        let slot = self
            .ledger
            .append(Post::locked(participant, amount, reference, timestamp));
        self.index.assign(participant, slot);
        info!(
            evt = "STAKE_AND_POST",
            participant = %participant,
            amount = %amount,
            reference = %reference,
            slot = slot.get(),
            timestamp,
            "stake locked"
        );
        self.emit(LedgerEvent::StakeAndPost {
            participant,
            amount,
            reference,
            slot,
        });
        Ok(slot)
    }

    /// Exits `participant`'s stake at the clock's current time.
    pub fn exit(&mut self, participant: &Identity) -> Result<ExitQuote, LedgerError> {
        let now = self.clock.now();
        self.exit_at(participant, now)
    }

    /// Exits `participant`'s stake as of `now`, paying the fee to the collector.
    pub fn exit_at(
        &mut self,
        participant: &Identity,
        now: Timestamp,
    ) -> Result<ExitQuote, LedgerError> {
        let slot = self.index.get(participant).ok_or_else(|| {
            warn!(evt = "EXIT_REJECTED", participant = %participant, "no active stake");
            LedgerError::NoActiveStake
        })?;
        let post = self
            .ledger
            .get_mut(slot)
            .ok_or(LedgerError::NoActiveStake)?;
        let account = StakeAccount::open(slot, post)?;
        let quote = account
            .quote_exit(now, self.hold_period, &self.fees)
            .inspect_err(|err| {
                warn!(evt = "EXIT_REJECTED", participant = %participant, %err);
            })?;
        self.vault.release(&quote.payouts()).inspect_err(|err| {
            warn!(evt = "EXIT_TRANSFER_FAILED", participant = %participant, %err);
        })?;

        account.close(&quote);
        self.index.remove(participant);
        info!(
            evt = "EXITED",
            participant = %participant,
            slot = slot.get(),
            payout = %quote.payout,
            fee = %quote.fee,
            collector = %quote.collector,
            "stake released"
        );
        self.emit(LedgerEvent::Exited {
            participant: *participant,
            payout: quote.payout,
            fee: quote.fee,
        });
        Ok(quote)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Active slot of `participant`, or `None` when nothing is locked.
    pub fn get_index_by_user(&self, participant: &Identity) -> Option<Slot> {
        let slot = self.index.get(participant);
        debug!(evt = "LOOKUP", participant = %participant, slot = Slot::signed(slot));
        slot
    }

    /// True when `participant` holds a locked stake.
    pub fn is_staked(&self, participant: &Identity) -> bool {
        self.index.contains(participant)
    }

    /// Earliest exit time of `participant`'s locked stake.
    pub fn unlocks_at(&self, participant: &Identity) -> Option<Timestamp> {
        let slot = self.index.get(participant)?;
        self.ledger
            .get(slot)
            .map(|post| post.timestamp().saturating_add(self.hold_period))
    }

    /// Record at `slot`.
    pub fn post(&self, slot: Slot) -> Option<&Post> {
        self.ledger.get(slot)
    }

    /// Every record in slot order.
    pub fn posts(&self) -> &[Post] {
        self.ledger.posts()
    }

    /// Number of records ever created.
    pub fn post_count(&self) -> usize {
        self.ledger.len()
    }

    /// Current fee configuration.
    pub fn fees(&self) -> &FeeConfig {
        &self.fees
    }

    /// Current fee rate in basis points.
    pub fn fee_rate(&self) -> u32 {
        self.fees.rate()
    }

    /// Current fee collector.
    pub fn fee_collector(&self) -> &Identity {
        self.fees.collector()
    }

    /// Current owner.
    pub fn owner(&self) -> &Identity {
        self.ownership.owner()
    }

    /// Hold period in seconds.
    pub fn hold_period(&self) -> u64 {
        self.hold_period
    }

    /// Value currently held in custody.
    pub fn custody(&self) -> Amount {
        self.vault.custody()
    }

    /// Clock collaborator.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Value-transfer collaborator.
    pub fn vault(&self) -> &V {
        &self.vault
    }

    /// Mutable value-transfer collaborator, for funding accounts outside the ledger.
    pub fn vault_mut(&mut self) -> &mut V {
        &mut self.vault
    }

    /// Notification sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable notification sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Splits the ledger into its persistent state and collaborators.
    pub fn into_parts(self) -> (LedgerSnapshot, C, V, S) {
        let snapshot = self.snapshot();
        (snapshot, self.clock, self.vault, self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::PostState;
    use crate::clock::ManualClock;
    use crate::events::EventLog;
    use crate::fee::MAX_RATE;
    use crate::transfer::{InMemoryVault, Payout, TransferError};

    const START: Timestamp = 1_700_000_000;
    const HOLD: u64 = 3 * 60 * 60;

    type Ledger = StakePost<ManualClock, InMemoryVault, EventLog>;

    fn id(byte: u8) -> Identity {
        Identity::from_bytes([byte; 20])
    }

    fn owner() -> Identity {
        id(0xAA)
    }

    fn reference() -> PostReference {
        "0x7D5A99F603F231D53A4F39D1521F98D2E8BB279CF29BEBFD0687DC98458E7F89"
            .parse()
            .unwrap()
    }

    fn ledger() -> (Ledger, ManualClock) {
        let clock = ManualClock::new(START);
        let mut vault = InMemoryVault::new();
        for byte in 1..=4 {
            vault.fund(id(byte), 1_000_000).unwrap();
        }
        let ledger = StakePost::new(
            owner(),
            LedgerConfig::default(),
            clock.clone(),
            vault,
            EventLog::new(),
        )
        .unwrap();
        (ledger, clock)
    }

    #[test]
    fn new_ledger_has_zero_fee_and_owner_collector() {
        let (ledger, _) = ledger();
        assert_eq!(ledger.fee_rate(), 0);
        assert_eq!(ledger.fee_collector(), &owner());
        assert_eq!(ledger.owner(), &owner());
        assert_eq!(ledger.hold_period(), HOLD);
        assert_eq!(ledger.get_index_by_user(&id(1)), None);
    }

    #[test]
    fn zero_owner_is_rejected() {
        let result = StakePost::new(
            Identity::ZERO,
            LedgerConfig::default(),
            ManualClock::new(0),
            InMemoryVault::new(),
            EventLog::new(),
        );
        assert!(matches!(result, Err(LedgerError::InvalidOwner)));
    }

    #[test]
    fn stake_records_and_indexes() {
        let (mut ledger, _) = ledger();
        let slot = ledger.stake_and_post(id(1), reference(), 500).unwrap();
        assert_eq!(slot, Slot::new(0));
        assert_eq!(ledger.get_index_by_user(&id(1)), Some(slot));
        let post = ledger.post(slot).unwrap();
        assert_eq!(post.participant(), &id(1));
        assert_eq!(post.stake(), 500);
        assert_eq!(post.reference().to_string(), reference().to_string());
        assert_eq!(post.timestamp(), START);
        assert_eq!(post.state(), PostState::Locked);
        assert_eq!(ledger.custody(), 500);
        assert_eq!(ledger.vault().balance_of(&id(1)), 999_500);
        assert_eq!(
            ledger.sink().last(),
            Some(&LedgerEvent::StakeAndPost {
                participant: id(1),
                amount: 500,
                reference: reference(),
                slot
            })
        );
    }

    #[test]
    fn zero_stake_is_rejected_without_effect() {
        let (mut ledger, _) = ledger();
        assert_eq!(
            ledger.stake_and_post(id(1), reference(), 0),
            Err(LedgerError::InvalidStake)
        );
        assert_eq!(ledger.post_count(), 0);
        assert!(ledger.sink().events().is_empty());
    }

    #[test]
    fn overlapping_stake_is_rejected() {
        let (mut ledger, _) = ledger();
        ledger.stake_and_post(id(1), reference(), 10).unwrap();
        assert_eq!(
            ledger.stake_and_post(id(1), reference(), 10),
            Err(LedgerError::AlreadyStaked)
        );
        assert_eq!(ledger.post_count(), 1);
        assert_eq!(ledger.custody(), 10);
    }

    #[test]
    fn failed_collection_commits_nothing() {
        let (mut ledger, _) = ledger();
        let err = ledger
            .stake_and_post(id(9), reference(), 10)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::TransferFailed(TransferError::InsufficientFunds { .. })
        ));
        assert_eq!(ledger.post_count(), 0);
        assert_eq!(ledger.get_index_by_user(&id(9)), None);
        assert!(ledger.sink().events().is_empty());
    }

    #[test]
    fn exit_respects_hold_period_boundary() {
        let (mut ledger, clock) = ledger();
        ledger.stake_and_post(id(1), reference(), 100).unwrap();
        clock.advance(HOLD - 1);
        assert_eq!(
            ledger.exit(&id(1)),
            Err(LedgerError::StillLocked {
                unlocks_at: START + HOLD,
                now: START + HOLD - 1
            })
        );
        assert!(ledger.is_staked(&id(1)));
        clock.advance(1);
        let quote = ledger.exit(&id(1)).unwrap();
        assert_eq!(quote.payout, 100);
        assert_eq!(quote.fee, 0);
        assert!(!ledger.is_staked(&id(1)));
        assert_eq!(ledger.exit(&id(1)), Err(LedgerError::NoActiveStake));
    }

    #[test]
    fn exit_pays_fee_to_collector() {
        let (mut ledger, clock) = ledger();
        ledger.set_fee_rate(&owner(), MAX_RATE).unwrap();
        ledger.set_fee_collector(&owner(), id(4)).unwrap();
        ledger.stake_and_post(id(1), reference(), 1_000).unwrap();
        clock.advance(HOLD);
        ledger.exit(&id(1)).unwrap();

        assert_eq!(ledger.vault().balance_of(&id(1)), 1_000_000 - 100);
        assert_eq!(ledger.vault().balance_of(&id(4)), 1_000_000 + 100);
        assert_eq!(ledger.custody(), 0);
        let post = ledger.post(Slot::new(0)).unwrap();
        assert_eq!(post.state(), PostState::Exited);
        assert_eq!(post.stake(), 900);
        assert_eq!(post.fee_paid(), 100);
        assert_eq!(post.exited_at(), Some(START + HOLD));
        assert_eq!(
            ledger.sink().last(),
            Some(&LedgerEvent::Exited {
                participant: id(1),
                payout: 900,
                fee: 100
            })
        );
    }

    #[test]
    fn restake_after_exit_uses_new_slot() {
        let (mut ledger, clock) = ledger();
        ledger.stake_and_post(id(1), reference(), 5).unwrap();
        ledger.stake_and_post(id(2), reference(), 5).unwrap();
        clock.advance(HOLD);
        ledger.exit(&id(1)).unwrap();
        let slot = ledger.stake_and_post(id(1), reference(), 7).unwrap();
        assert_eq!(slot, Slot::new(2));
        assert_eq!(ledger.get_index_by_user(&id(1)), Some(slot));
        assert_eq!(ledger.unlocks_at(&id(1)), Some(START + 2 * HOLD));
    }

    #[test]
    fn admin_calls_require_owner() {
        let (mut ledger, _) = ledger();
        assert_eq!(ledger.set_fee_rate(&id(1), 100), Err(LedgerError::Unauthorized));
        assert_eq!(
            ledger.set_fee_collector(&id(1), id(1)),
            Err(LedgerError::Unauthorized)
        );
        assert_eq!(
            ledger.transfer_ownership(&id(1), id(1)),
            Err(LedgerError::Unauthorized)
        );
        assert_eq!(ledger.fee_rate(), 0);
        assert!(ledger.sink().events().is_empty());
    }

    #[test]
    fn ownership_transfer_moves_admin_rights() {
        let (mut ledger, _) = ledger();
        ledger.transfer_ownership(&owner(), id(3)).unwrap();
        assert_eq!(ledger.owner(), &id(3));
        assert_eq!(ledger.fee_collector(), &owner());
        assert_eq!(ledger.set_fee_rate(&owner(), 1), Err(LedgerError::Unauthorized));
        ledger.set_fee_rate(&id(3), 1).unwrap();
        assert_eq!(
            ledger.sink().events()[0],
            LedgerEvent::OwnershipTransferred {
                previous: owner(),
                owner: id(3)
            }
        );
    }

    struct FlakyVault {
        inner: InMemoryVault,
        fail_release: bool,
    }

    impl ValueTransfer for FlakyVault {
        fn collect(&mut self, from: &Identity, amount: Amount) -> Result<(), TransferError> {
            self.inner.collect(from, amount)
        }

        fn release(&mut self, batch: &[Payout]) -> Result<(), TransferError> {
            if self.fail_release {
                return Err(TransferError::Rejected("network down".into()));
            }
            self.inner.release(batch)
        }

        fn custody(&self) -> Amount {
            self.inner.custody()
        }
    }

    #[test]
    fn failed_release_leaves_stake_locked() {
        let clock = ManualClock::new(START);
        let mut inner = InMemoryVault::new();
        inner.fund(id(1), 50).unwrap();
        let vault = FlakyVault {
            inner,
            fail_release: true,
        };
        let mut ledger = StakePost::new(
            owner(),
            LedgerConfig::default(),
            clock.clone(),
            vault,
            EventLog::new(),
        )
        .unwrap();
        ledger.stake_and_post(id(1), reference(), 50).unwrap();
        clock.advance(HOLD);

        let err = ledger.exit(&id(1)).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(ledger.get_index_by_user(&id(1)), Some(Slot::new(0)));
        assert_eq!(ledger.post(Slot::new(0)).unwrap().state(), PostState::Locked);
        assert_eq!(ledger.custody(), 50);
        assert_eq!(ledger.sink().events().len(), 1);

        ledger.vault_mut().fail_release = false;
        ledger.exit(&id(1)).unwrap();
        assert_eq!(ledger.vault().inner.balance_of(&id(1)), 50);
    }

    #[test]
    fn snapshot_restores_equivalent_ledger() {
        let (mut ledger, clock) = ledger();
        ledger.set_fee_rate(&owner(), 250).unwrap();
        ledger.stake_and_post(id(1), reference(), 40).unwrap();
        ledger.stake_and_post(id(2), reference(), 60).unwrap();
        clock.advance(HOLD);
        ledger.exit(&id(1)).unwrap();

        let (snapshot, clock, vault, sink) = ledger.into_parts();
        let restored = StakePost::from_snapshot(snapshot.clone(), clock, vault, sink).unwrap();
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.fee_rate(), 250);
        assert_eq!(restored.get_index_by_user(&id(1)), None);
        assert_eq!(restored.get_index_by_user(&id(2)), Some(Slot::new(1)));
    }
}
