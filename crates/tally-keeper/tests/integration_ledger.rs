// crates/tally-keeper/tests/integration_ledger.rs
//
// End-to-end tests for the Tally ledger.
//
// Wires a staking engine into a points hub next to batch-synced partner
// points and penalties, then drives deposits, checkpoints, closes, and
// redemptions through the public library APIs (the keeper is a binary
// crate with no lib.rs).

use std::sync::{Arc, RwLock};

use tally_core::{AccountingSource, Moment, ParticipantId, QueryBudget, TallyError};
use tally_hub::{
    HubParams, PointsHub, SourceOutcome, StakingSource, SyncedPenaltyLedger, SyncedPointsSource,
    REDEMPTION_PRECISION,
};
use tally_staking::{
    compute_penalty, CheckpointOutcome, InMemoryCustody, StakingEngine, StakingParams,
    SECONDS_PER_DAY,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DAY: u64 = SECONDS_PER_DAY;
const T0: u64 = 1_700_000_000;

fn alice() -> ParticipantId {
    ParticipantId::new([0xa1; 32])
}

fn bob() -> ParticipantId {
    ParticipantId::new([0xb0; 32])
}

fn treasury() -> ParticipantId {
    ParticipantId::new([0xee; 32])
}

fn at(secs: u64, block: u64) -> Moment {
    Moment::new(T0 + secs, block)
}

/// Staking engine at rate 1 with funded wallets, behind a shared lock.
fn shared_engine() -> Arc<RwLock<StakingEngine>> {
    let mut custody = InMemoryCustody::new();
    custody.mint(alice(), 1_000_000);
    custody.mint(bob(), 1_000_000);
    Arc::new(RwLock::new(
        StakingEngine::new(StakingParams::default(), custody).unwrap(),
    ))
}

/// Hub with the staking engine as its first source and a funded reward pool.
fn hub_over(engine: &Arc<RwLock<StakingEngine>>, exchange_rate: u128, pool: u128) -> PointsHub {
    let mut rewards = InMemoryCustody::new();
    rewards.mint(treasury(), pool);
    let params = HubParams {
        exchange_rate,
        redemption_enabled: true,
        ..HubParams::default()
    };
    let mut hub = PointsHub::new(params, rewards);
    hub.register_source(Arc::new(StakingSource::new("staking", engine.clone())))
        .unwrap();
    if pool > 0 {
        hub.fund_pool(treasury(), pool).unwrap();
    }
    hub
}

struct Panicking;

impl AccountingSource for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }
    fn is_active(&self) -> bool {
        true
    }
    fn points(&self, _: &ParticipantId, _: &Moment, _: &mut QueryBudget) -> Result<u128, TallyError> {
        panic!("partner contract reverted");
    }
}

struct Greedy;

impl AccountingSource for Greedy {
    fn name(&self) -> &str {
        "greedy"
    }
    fn is_active(&self) -> bool {
        true
    }
    fn points(&self, _: &ParticipantId, _: &Moment, budget: &mut QueryBudget) -> Result<u128, TallyError> {
        loop {
            budget.charge(1_000)?;
        }
    }
}

// ---------------------------------------------------------------------------
// Accrual examples
// ---------------------------------------------------------------------------

#[test]
fn test_uncommitted_day_through_hub() {
    let engine = shared_engine();
    engine
        .write()
        .unwrap()
        .open_uncommitted(alice(), 100, at(0, 1))
        .unwrap();
    let hub = hub_over(&engine, REDEMPTION_PRECISION, 0);

    assert_eq!(hub.total_points(&alice(), &at(DAY, 2)), 8_640_000);
}

#[test]
fn test_full_year_commitment_day_through_hub() {
    let engine = shared_engine();
    engine
        .write()
        .unwrap()
        .open_committed(alice(), 1_000, 365, at(0, 1))
        .unwrap();
    let hub = hub_over(&engine, REDEMPTION_PRECISION, 0);

    assert_eq!(hub.total_points(&alice(), &at(DAY, 2)), 172_800_000);
}

#[test]
fn test_penalty_worked_example() {
    let quote = compute_penalty(1_000, 185 * DAY, 365 * DAY);
    assert_eq!(quote.penalty, 253);
    assert!(!quote.capped);
}

#[test]
fn test_points_monotonic_across_expiry() {
    let engine = shared_engine();
    engine
        .write()
        .unwrap()
        .open_committed(alice(), 1_000, 7, at(0, 1))
        .unwrap();
    let hub = hub_over(&engine, REDEMPTION_PRECISION, 0);

    let mut previous = 0u128;
    for secs in [0, DAY, 7 * DAY - 1, 7 * DAY, 7 * DAY + 1, 30 * DAY] {
        let total = hub.total_points(&alice(), &at(secs, 2));
        assert!(total >= previous, "points fell at +{}s", secs);
        previous = total;
    }
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

#[test]
fn test_same_block_checkpoint_is_protected() {
    let engine = shared_engine();
    let mut guard = engine.write().unwrap();
    guard.open_uncommitted(alice(), 500, at(0, 10)).unwrap();

    assert_eq!(
        guard.checkpoint_one(alice(), at(0, 10)).unwrap(),
        CheckpointOutcome::Protected { blocks_remaining: 1 }
    );
    assert_eq!(
        guard.checkpoint_one(alice(), at(12, 11)).unwrap(),
        CheckpointOutcome::Advanced {
            positions: 1,
            points_credited: 6_000
        }
    );
}

#[test]
fn test_checkpoint_does_not_change_totals() {
    let engine = shared_engine();
    {
        let mut guard = engine.write().unwrap();
        guard.open_committed(alice(), 1_000, 90, at(0, 1)).unwrap();
        guard.open_uncommitted(bob(), 250, at(0, 1)).unwrap();
    }
    let hub = hub_over(&engine, REDEMPTION_PRECISION, 0);
    let later = at(3 * DAY, 500);
    let before = (hub.total_points(&alice(), &later), hub.total_points(&bob(), &later));

    let report = engine
        .write()
        .unwrap()
        .checkpoint_many(&[alice(), ParticipantId::UNSET, bob()], later)
        .unwrap();
    assert_eq!(report.advanced.len(), 2);
    assert_eq!(report.skipped, vec![1]);
    assert_eq!(report.points_credited(), before.0 + before.1);

    let after = (hub.total_points(&alice(), &later), hub.total_points(&bob(), &later));
    assert_eq!(before, after);
}

// ---------------------------------------------------------------------------
// Redemption across sources
// ---------------------------------------------------------------------------

#[test]
fn test_redeem_everything_then_close_early() {
    let engine = shared_engine();
    let id = engine
        .write()
        .unwrap()
        .open_committed(alice(), 1_000, 365, at(0, 1))
        .unwrap();

    // 1e-6 reward units per point.
    let mut hub = hub_over(&engine, REDEMPTION_PRECISION / 1_000_000, 1_000);
    let partner = Arc::new(SyncedPointsSource::new("partner"));
    partner.apply_grants(&[(alice(), 1_000)]).unwrap();
    hub.register_source(partner).unwrap();
    let penalties = Arc::new(SyncedPenaltyLedger::new("penalties"));
    penalties.apply_penalties(&[(alice(), 500)]).unwrap();
    hub.set_penalty_source(Some(penalties));

    let day_one = at(DAY, 7_200);
    let claimable = hub.claimable(&alice(), &day_one);
    assert_eq!(claimable, 172_800_000 + 1_000 - 500);

    let receipt = hub.redeem(alice(), claimable, day_one).unwrap();
    assert_eq!(receipt.reward, 172);
    assert_eq!(hub.pool_balance(), 1_000 - 172);
    assert_eq!(hub.reward_custody().balance_of(&alice()), 172);
    assert_eq!(
        hub.redeem(alice(), 1, day_one),
        Err(TallyError::InsufficientPoints {
            requested: 1,
            claimable: 0
        })
    );

    // Leaving 364 days early forfeits half the pro-rated points.
    let close = engine.write().unwrap().close(alice(), id, day_one).unwrap();
    assert_eq!(close.penalty, 86_163_287);
    assert_eq!(close.points_retained, 86_636_713);
    assert_eq!(close.amount_returned, 1_000);
    assert_eq!(engine.read().unwrap().custody().balance_of(&alice()), 1_000_000);

    // Redeemed now exceeds what remains; claimable saturates.
    assert_eq!(hub.total_points(&alice(), &day_one), 86_636_713 + 1_000);
    assert_eq!(hub.claimable(&alice(), &at(30 * DAY, 9_000)), 0);
}

#[test]
fn test_faulty_sources_are_isolated() {
    let engine = shared_engine();
    engine
        .write()
        .unwrap()
        .open_uncommitted(alice(), 100, at(0, 1))
        .unwrap();
    let mut hub = hub_over(&engine, REDEMPTION_PRECISION, 10_000_000);
    hub.register_source(Arc::new(Panicking)).unwrap();
    hub.register_source(Arc::new(Greedy)).unwrap();
    let partner = Arc::new(SyncedPointsSource::new("partner"));
    partner.apply_grants(&[(alice(), 40)]).unwrap();
    hub.register_source(partner).unwrap();

    let now = at(DAY, 2);
    let breakdown = hub.points_breakdown(&alice(), &now);
    assert_eq!(breakdown[0].outcome, SourceOutcome::Counted(8_640_000));
    assert_eq!(breakdown[1].outcome, SourceOutcome::Panicked);
    assert_eq!(breakdown[2].outcome, SourceOutcome::BudgetExceeded);
    assert_eq!(breakdown[3].outcome, SourceOutcome::Counted(40));
    assert_eq!(hub.total_points(&alice(), &now), 8_640_040);

    // Redemption still works off the healthy sources.
    let receipt = hub.redeem(alice(), 8_640_040, now).unwrap();
    assert_eq!(receipt.reward, 8_640_040);
}

#[test]
fn test_delisted_staking_source_stops_counting() {
    let engine = shared_engine();
    engine
        .write()
        .unwrap()
        .open_uncommitted(alice(), 100, at(0, 1))
        .unwrap();
    let staking = Arc::new(StakingSource::new("staking", engine.clone()));
    let mut hub = PointsHub::new(HubParams::default(), InMemoryCustody::new());
    hub.register_source(staking.clone()).unwrap();

    assert_eq!(hub.total_points(&alice(), &at(10, 2)), 1_000);
    staking.set_listed(false);
    assert_eq!(hub.total_points(&alice(), &at(10, 2)), 0);
    assert_eq!(hub.redeem(alice(), 1, at(10, 2)), Err(TallyError::RedemptionDisabled));
}
