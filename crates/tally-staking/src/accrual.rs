// crates/tally-staking/src/accrual.rs
//
// Accrual calculator.
//
// points = amount * boost * rate_per_second * duration / BOOST_BASE
//
// Points are computed on read from the stored snapshot; nothing is pushed
// per tick. Each position's math depends only on its own snapshot and the
// current accrual configuration.
//
// A committed window that straddles `commitment_ends_at` is split: seconds
// before the end earn the committed boost, seconds at or after earn 1.0x.
// No party has to act at expiry.

use serde::{Deserialize, Serialize};

use crate::position::{Position, PositionKind};
use crate::units::{BOOST_BASE, MAX_ACCRUAL_WINDOW_SECS};

/// Versioned accrual configuration, read at every calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// Bumped on every admin update.
    pub version: u64,
    /// Points per second per unit of amount at 1.0x.
    pub rate_per_second: u128,
    /// When false, no position accrues.
    pub active: bool,
}

impl AccrualConfig {
    pub fn new(rate_per_second: u128, active: bool) -> Self {
        Self {
            version: 1,
            rate_per_second,
            active,
        }
    }
}

/// Boost applying to `position` at instant `now`.
pub fn effective_boost(position: &Position, now: u64) -> u128 {
    match position.kind {
        PositionKind::Uncommitted => BOOST_BASE,
        PositionKind::Committed if now >= position.commitment_ends_at => BOOST_BASE,
        PositionKind::Committed => position.committed_boost(),
    }
}

/// Points earned over `secs` seconds at a constant boost.
///
/// With every factor inside its admissible maximum the product cannot
/// overflow; saturation only guards inputs that bypassed validation.
fn window_points(amount: u128, boost: u128, rate: u128, secs: u64) -> u128 {
    let secs = secs.min(MAX_ACCRUAL_WINDOW_SECS) as u128;
    amount
        .saturating_mul(boost)
        .saturating_mul(rate)
        .saturating_mul(secs)
        / BOOST_BASE
}

/// Points earned by `position` since its last accrual, as of `now`.
pub fn points_since_last_accrual(position: &Position, config: &AccrualConfig, now: u64) -> u128 {
    if !position.is_open || !config.active {
        return 0;
    }
    let from = position.last_accrual_at;
    if now <= from {
        return 0;
    }

    let rate = config.rate_per_second;
    match position.kind {
        PositionKind::Uncommitted => window_points(position.amount, BOOST_BASE, rate, now - from),
        PositionKind::Committed => {
            let ends = position.commitment_ends_at;
            let boosted_secs = now.min(ends).saturating_sub(from);
            let base_secs = now.saturating_sub(from.max(ends));
            window_points(position.amount, position.committed_boost(), rate, boosted_secs)
                .saturating_add(window_points(position.amount, BOOST_BASE, rate, base_secs))
        }
    }
}

/// Always-fresh point total of `position` at `now`.
pub fn total_points(position: &Position, config: &AccrualConfig, now: u64) -> u128 {
    position
        .accrued_value
        .saturating_add(points_since_last_accrual(position, config, now))
}

/// Fold pending points into `accrued_value` and move the snapshot to `now`.
///
/// Returns the points credited. Calling twice at the same `now` credits
/// zero the second time. Closed positions and instants at or before the
/// snapshot leave the position untouched.
pub fn accrue(position: &mut Position, config: &AccrualConfig, now: u64) -> u128 {
    if !position.is_open || now <= position.last_accrual_at {
        return 0;
    }
    let earned = points_since_last_accrual(position, config, now);
    position.accrued_value = position.accrued_value.saturating_add(earned);
    position.last_accrual_at = now;
    tracing::trace!(
        owner = %position.owner,
        position_id = position.id,
        earned,
        accrued = position.accrued_value,
        "accrual folded"
    );
    earned
}
