// crates/tally-staking/src/units.rs
//
// Fixed-point constants for staking accrual.
//
// Boost factors are integers where BOOST_BASE (10,000) means 1.0x. Penalty
// fractions are basis points over FRACTION_BASE. Amounts and points are u128.
//
// The admissible maxima are chosen so that the four-factor accrual product
//   amount * boost * rate * duration
// stays inside u128 for every admissible input:
//   10^21 * 20,000 * 1,000 * 3,153,600,000 ~= 6.3 * 10^37 < u128::MAX ~= 3.4 * 10^38

/// Boost factor representing 1.0x.
pub const BOOST_BASE: u128 = 10_000;

/// Extra boost granted at the maximum commitment (so the top boost is 2.0x).
pub const MAX_EXTRA_BOOST: u128 = 10_000;

/// Shortest commitment that earns a boost, in days.
pub const MIN_COMMITMENT_DAYS: u32 = 7;

/// Longest commitment, in days. Longer inputs are clamped.
pub const MAX_COMMITMENT_DAYS: u32 = 365;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Share of accrued points forfeited at a full-length early exit (50%).
pub const PENALTY_FRACTION_BPS: u128 = 5_000;

/// Denominator for basis-point fractions.
pub const FRACTION_BASE: u128 = 10_000;

/// Largest deposit a single position may hold.
pub const MAX_STAKE_AMOUNT: u128 = 1_000_000_000_000_000_000_000;

/// Largest accrual rate (points per second per unit of amount).
pub const MAX_RATE_PER_SECOND: u128 = 1_000;

/// Longest single accrual window (100 years of 365 days). Longer windows are clamped.
pub const MAX_ACCRUAL_WINDOW_SECS: u64 = 100 * 365 * SECONDS_PER_DAY;
