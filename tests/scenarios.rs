//! End-to-end ledger scenarios driven through the public API.

use proptest::prelude::*;
use stake_post::{
    EventLog, Identity, InMemoryVault, LedgerConfig, LedgerError, LedgerEvent, ManualClock,
    PostReference, PostState, Slot, StakePost, MAX_RATE, NO_SLOT,
};

const POST_HASH: &str = "0x7D5A99F603F231D53A4F39D1521F98D2E8BB279CF29BEBFD0687DC98458E7F89";
const ONE_ETHER: u128 = 1_000_000_000_000_000_000;
const START: u64 = 1_700_000_000;
const THREE_HOURS: u64 = 3 * 60 * 60;

type Ledger = StakePost<ManualClock, InMemoryVault, EventLog>;

fn owner() -> Identity {
    "0x00000000000000000000000000000000000000a0".parse().unwrap()
}

fn user() -> Identity {
    "0x00000000000000000000000000000000000000b1".parse().unwrap()
}

fn outsider() -> Identity {
    "0x00000000000000000000000000000000000000c2".parse().unwrap()
}

fn fresh(clock: &ManualClock, funded: &[(Identity, u128)]) -> Ledger {
    let mut vault = InMemoryVault::new();
    for (account, amount) in funded {
        vault.fund(*account, *amount).unwrap();
    }
    StakePost::new(
        owner(),
        LedgerConfig::default(),
        clock.clone(),
        vault,
        EventLog::new(),
    )
    .unwrap()
}

#[test]
fn stake_then_exit_after_hold_period() {
    let clock = ManualClock::new(START);
    let mut ledger = fresh(&clock, &[(user(), ONE_ETHER)]);
    assert_eq!(ledger.fee_rate(), 0);
    assert_eq!(ledger.fee_collector(), &owner());
    assert_eq!(ledger.hold_period(), THREE_HOURS);

    let reference: PostReference = POST_HASH.parse().unwrap();
    let slot = ledger.stake_and_post(user(), reference, ONE_ETHER).unwrap();
    assert_eq!(slot, Slot::new(0));
    assert_eq!(ledger.custody(), ONE_ETHER);
    assert_eq!(ledger.vault().balance_of(&user()), 0);

    let post = ledger.post(slot).unwrap();
    assert_eq!(post.participant(), &user());
    assert_eq!(post.stake(), ONE_ETHER);
    assert_eq!(post.reference().to_string(), POST_HASH.to_lowercase());
    assert_eq!(post.timestamp(), START);
    assert_eq!(post.state(), PostState::Locked);
    assert_eq!(ledger.get_index_by_user(&user()), Some(slot));

    clock.advance(THREE_HOURS);
    let quote = ledger.exit(&user()).unwrap();
    assert_eq!((quote.payout, quote.fee), (ONE_ETHER, 0));
    assert_eq!(
        ledger.sink().last(),
        Some(&LedgerEvent::Exited {
            participant: user(),
            payout: ONE_ETHER,
            fee: 0,
        })
    );
    assert_eq!(ledger.get_index_by_user(&user()), None);
    assert_eq!(ledger.custody(), 0);
    assert_eq!(ledger.vault().balance_of(&user()), ONE_ETHER);
    assert_eq!(ledger.post(slot).unwrap().state(), PostState::Exited);
}

#[test]
fn exit_one_second_early_is_rejected() {
    let clock = ManualClock::new(START);
    let mut ledger = fresh(&clock, &[(user(), 10)]);
    ledger
        .stake_and_post(user(), POST_HASH.parse().unwrap(), 10)
        .unwrap();
    clock.advance(THREE_HOURS - 1);
    assert_eq!(
        ledger.exit(&user()),
        Err(LedgerError::StillLocked {
            unlocks_at: START + THREE_HOURS,
            now: START + THREE_HOURS - 1,
        })
    );
    assert!(ledger.is_staked(&user()));
    assert_eq!(ledger.custody(), 10);
}

#[test]
fn fee_rate_is_admin_only_and_bounded() {
    let clock = ManualClock::new(START);
    let mut ledger = fresh(&clock, &[]);

    ledger.set_fee_rate(&owner(), 100).unwrap();
    assert_eq!(ledger.sink().last(), Some(&LedgerEvent::FeeUpdated { rate: 100 }));
    assert_eq!(ledger.fee_rate(), 100);

    assert_eq!(
        ledger.set_fee_rate(&outsider(), 100),
        Err(LedgerError::Unauthorized)
    );
    assert_eq!(
        ledger.set_fee_rate(&owner(), 100_000),
        Err(LedgerError::RateTooHigh {
            rate: 100_000,
            max: MAX_RATE,
        })
    );
    assert_eq!(ledger.fee_rate(), 100);
    assert_eq!(ledger.sink().events().len(), 1);
}

#[test]
fn fee_goes_to_the_collector_in_force_at_exit() {
    let clock = ManualClock::new(START);
    let collector = outsider();
    let mut ledger = fresh(&clock, &[(user(), 1_000)]);
    ledger.set_fee_rate(&owner(), 100).unwrap();
    ledger
        .stake_and_post(user(), POST_HASH.parse().unwrap(), 1_000)
        .unwrap();
    ledger.set_fee_collector(&owner(), collector).unwrap();

    clock.advance(THREE_HOURS);
    let quote = ledger.exit(&user()).unwrap();
    assert_eq!((quote.payout, quote.fee), (990, 10));
    assert_eq!(ledger.vault().balance_of(&user()), 990);
    assert_eq!(ledger.vault().balance_of(&collector), 10);
    assert_eq!(ledger.vault().balance_of(&owner()), 0);
}

#[test]
fn lookup_after_exit_and_restake() {
    let clock = ManualClock::new(START);
    let mut ledger = fresh(&clock, &[(user(), 20)]);
    let first = ledger
        .stake_and_post(user(), POST_HASH.parse().unwrap(), 10)
        .unwrap();
    assert_eq!(
        ledger.stake_and_post(user(), POST_HASH.parse().unwrap(), 10),
        Err(LedgerError::AlreadyStaked)
    );
    clock.advance(THREE_HOURS);
    ledger.exit(&user()).unwrap();
    assert_eq!(Slot::signed(ledger.get_index_by_user(&user())), NO_SLOT);

    let second = ledger
        .stake_and_post(user(), PostReference::from_content(b"second"), 10)
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(Slot::signed(ledger.get_index_by_user(&user())), 1);
    assert_eq!(ledger.post_count(), 2);
}

#[test]
fn snapshot_round_trip_keeps_the_lookup() {
    let clock = ManualClock::new(START);
    let mut ledger = fresh(&clock, &[(user(), 10)]);
    ledger
        .stake_and_post(user(), POST_HASH.parse().unwrap(), 10)
        .unwrap();
    let (snapshot, clock, vault, _) = ledger.into_parts();
    let json = serde_json::to_string(&snapshot).unwrap();

    let restored: Ledger = StakePost::from_snapshot(
        serde_json::from_str(&json).unwrap(),
        clock,
        vault,
        EventLog::new(),
    )
    .unwrap();
    assert_eq!(restored.get_index_by_user(&user()), Some(Slot::new(0)));
    assert_eq!(restored.snapshot().state_root(), snapshot.state_root());
}

proptest! {
    #[test]
    fn unstaked_participant_has_no_slot(bytes in any::<[u8; 20]>(), staked in 0u8..8) {
        let clock = ManualClock::new(START);
        let stakers: Vec<Identity> = (0..staked)
            .map(|i| Identity::from_bytes([0xF0 | i; 20]))
            .collect();
        let funded: Vec<_> = stakers.iter().map(|id| (*id, 5u128)).collect();
        let mut ledger = fresh(&clock, &funded);
        for staker in &stakers {
            ledger
                .stake_and_post(*staker, PostReference::from_content(staker.as_bytes()), 5)
                .unwrap();
        }
        let probe = Identity::from_bytes(bytes);
        prop_assume!(!stakers.contains(&probe));
        prop_assert_eq!(ledger.get_index_by_user(&probe), None);
        prop_assert_eq!(Slot::signed(ledger.get_index_by_user(&probe)), NO_SLOT);
    }

    #[test]
    fn exit_conserves_value(amount in 1u128..=u64::MAX as u128, rate in 0u32..=MAX_RATE) {
        let clock = ManualClock::new(START);
        let mut ledger = fresh(&clock, &[(user(), amount)]);
        ledger.set_fee_rate(&owner(), rate).unwrap();
        ledger
            .stake_and_post(user(), POST_HASH.parse().unwrap(), amount)
            .unwrap();
        clock.advance(THREE_HOURS);
        let quote = ledger.exit(&user()).unwrap();
        prop_assert_eq!(quote.payout + quote.fee, amount);
        prop_assert_eq!(ledger.custody(), 0);
        prop_assert_eq!(
            ledger.vault().balance_of(&user()) + ledger.vault().balance_of(&owner()),
            amount
        );
    }
}
