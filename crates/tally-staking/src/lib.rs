// crates/tally-staking/src/lib.rs
//
// tally-staking: the staking accrual engine of the Tally ledger.
//
// Positions accrue points lazily. Each position is a pure function of its
// stored snapshot and the current time; the snapshot only moves forward at
// explicit checkpoints or when the position is closed.
//
// All ratios are integers scaled by an explicit base (see `units`).

pub mod accrual;
pub mod checkpoint;
pub mod custody;
pub mod multiplier;
pub mod params;
pub mod penalty;
pub mod position;
pub mod staking;
pub mod units;

// Re-export key types for ergonomic access from downstream crates.
pub use accrual::{accrue, effective_boost, points_since_last_accrual, total_points, AccrualConfig};
pub use checkpoint::{BatchCheckpointReport, CheckpointOutcome};
pub use custody::InMemoryCustody;
pub use multiplier::boost_for_days;
pub use params::StakingParams;
pub use penalty::{compute_penalty, PenaltyQuote};
pub use position::{ParticipantAccount, Position, PositionKind, PositionView};
pub use staking::{CloseReceipt, LedgerSnapshot, StakingEngine};
pub use units::{
    BOOST_BASE, MAX_ACCRUAL_WINDOW_SECS, MAX_COMMITMENT_DAYS, MAX_EXTRA_BOOST,
    MAX_RATE_PER_SECOND, MAX_STAKE_AMOUNT, MIN_COMMITMENT_DAYS, SECONDS_PER_DAY,
};
