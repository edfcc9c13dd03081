// crates/tally-staking/src/penalty.rs
//
// Early-exit penalty for committed positions.
//
//   theoretical = accrued * remaining * PENALTY_FRACTION_BPS / (commitment * FRACTION_BASE)
//   actual      = min(theoretical, accrued)
//
// `remaining` and `commitment` are seconds. The penalty is computed from
// the accrued value at the close instant, after accrual has been folded
// up to that instant. It never exceeds what has accrued; when the
// theoretical amount would, the close is flagged as capped and the excess
// is not collectible.

use serde::{Deserialize, Serialize};

use crate::position::Position;
use crate::units::{FRACTION_BASE, PENALTY_FRACTION_BPS};

/// Outcome of a penalty computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyQuote {
    /// Points forfeited.
    pub penalty: u128,
    /// The theoretical penalty exceeded accrued points.
    pub capped: bool,
}

/// Compute the penalty for forfeiting `accrued` points with `remaining`
/// of `commitment` seconds left.
pub fn compute_penalty(accrued: u128, remaining: u64, commitment: u64) -> PenaltyQuote {
    if remaining == 0 || commitment == 0 || accrued == 0 {
        return PenaltyQuote::default();
    }

    let theoretical = mul_div_floor(
        accrued,
        (remaining as u128) * PENALTY_FRACTION_BPS,
        (commitment as u128) * FRACTION_BASE,
    );

    if theoretical > accrued {
        PenaltyQuote {
            penalty: accrued,
            capped: true,
        }
    } else {
        PenaltyQuote {
            penalty: theoretical,
            capped: false,
        }
    }
}

/// floor(a * m / d) without forming `a * m` when it would overflow.
fn mul_div_floor(a: u128, m: u128, d: u128) -> u128 {
    match a.checked_mul(m) {
        Some(product) => product / d,
        None => (a / d)
            .saturating_mul(m)
            .saturating_add((a % d).saturating_mul(m) / d),
    }
}

/// Penalty a close of `position` at `now` would apply, given `accrued`
/// points at that instant. Uncommitted and expired positions owe nothing.
pub fn penalty_for_close(position: &Position, accrued: u128, now: u64) -> PenaltyQuote {
    if !position.is_locked_at(now) {
        return PenaltyQuote::default();
    }
    compute_penalty(
        accrued,
        position.remaining_commitment(now),
        position.commitment_secs(),
    )
}
