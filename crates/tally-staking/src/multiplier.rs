// crates/tally-staking/src/multiplier.rs
//
// Commitment-length boost.
//
// boost = BOOST_BASE + floor(days * MAX_EXTRA_BOOST / MAX_COMMITMENT_DAYS)
//
// Linear from 1.0x for uncommitted positions to 2.0x at 365 days. Inputs
// above 365 are clamped to 365; positive inputs below the 7-day minimum
// are treated as uncommitted. Integer arithmetic only, so every
// re-execution produces the same factor.

use crate::units::{BOOST_BASE, MAX_COMMITMENT_DAYS, MAX_EXTRA_BOOST, MIN_COMMITMENT_DAYS};

/// Boost factor (in `BOOST_BASE` units) for a commitment of `days`.
pub fn boost_for_days(days: u32) -> u128 {
    let days = days.min(MAX_COMMITMENT_DAYS);
    if days < MIN_COMMITMENT_DAYS {
        return BOOST_BASE;
    }
    BOOST_BASE + (days as u128 * MAX_EXTRA_BOOST) / MAX_COMMITMENT_DAYS as u128
}
