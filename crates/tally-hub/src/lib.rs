// crates/tally-hub/src/lib.rs
//
// tally-hub: aggregation hub for the Tally ledger.
//
// The hub queries an ordered, bounded list of independent accounting
// sources, sums what they report, nets out an external penalty source and
// the participant's redeemed total, and converts the remainder into reward
// units at an administrator-set rate.
//
// Each source call is isolated: a source that errors, panics, runs past its
// budget, or reports an impossible value contributes zero and the
// aggregation carries on.

pub mod bulkhead;
pub mod hub;
pub mod params;
pub mod pool;
pub mod redemption;
pub mod sources;
pub mod staking_source;

// Re-export key types for ergonomic access from downstream crates.
pub use bulkhead::{SourceOutcome, SourceReport, MAX_SOURCES, MAX_SOURCE_POINTS};
pub use hub::{HubSnapshot, PointsHub};
pub use params::HubParams;
pub use pool::RewardPool;
pub use redemption::{RedemptionLedger, RedemptionReceipt, RedemptionSettings, REDEMPTION_PRECISION};
pub use sources::{SyncedPenaltyLedger, SyncedPointsSource};
pub use staking_source::StakingSource;
