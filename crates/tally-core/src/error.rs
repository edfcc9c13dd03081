// crates/tally-core/src/error.rs
//
// Ledger-wide error types. Variants are grouped the way callers react to
// them: validation failures (fix the request), resource failures (retry
// later or with less), registry failures, and collaborator failures.
// Source-isolation variants are produced by accounting sources and are
// absorbed by the aggregation hub rather than surfaced from its reads.

use thiserror::Error;

/// Protocol-wide error type for the Tally ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TallyError {
    // ----- Validation -----
    /// A deposit, close, or redemption was requested for zero units.
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// A deposit exceeds the admissible maximum for accrual math.
    #[error("Amount {amount} exceeds the maximum of {max}")]
    AmountTooLarge { amount: u128, max: u128 },

    /// A commitment length outside the accepted day range.
    #[error("Commitment of {days} days is outside the accepted range")]
    InvalidCommitment { days: u32 },

    /// The all-zero participant identity was supplied to a write.
    #[error("Participant identity is unset")]
    UnsetParticipant,

    /// No position exists under the given handle.
    #[error("Position {0} not found")]
    PositionNotFound(u64),

    /// The position has already been closed.
    #[error("Position {0} is already closed")]
    PositionClosed(u64),

    /// A batch call carried more entries than allowed.
    #[error("Batch of {len} entries exceeds the maximum of {max}")]
    BatchTooLarge { len: usize, max: usize },

    /// The participant already holds the maximum number of positions.
    #[error("Participant already holds the maximum of {max} positions")]
    TooManyPositions { max: usize },

    /// An accrual rate above the admissible maximum.
    #[error("Rate {rate} exceeds the maximum of {max}")]
    RateTooLarge { rate: u128, max: u128 },

    /// A configuration value is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ----- Resource -----
    /// The reward pool cannot cover the payout.
    #[error("Insufficient reward pool: requested {requested} but only {available} available")]
    InsufficientPool { requested: u128, available: u128 },

    /// The redemption exceeds the per-transaction cap.
    #[error("Redemption of {amount} points exceeds the per-transaction cap of {cap}")]
    RedeemCapExceeded { amount: u128, cap: u128 },

    /// The participant does not have enough claimable points.
    #[error("Insufficient points: requested {requested} but only {claimable} claimable")]
    InsufficientPoints { requested: u128, claimable: u128 },

    /// Redemption is switched off.
    #[error("Redemption is disabled")]
    RedemptionDisabled,

    /// No exchange rate has been set.
    #[error("Exchange rate is not configured")]
    RateNotConfigured,

    /// The requested points convert to zero reward units.
    #[error("Redemption of {0} points yields no reward at the current rate")]
    RewardRoundsToZero(u128),

    /// The penalty source could not be read, so claimable points are unknown.
    #[error("Penalty source unavailable: {0}")]
    PenaltySourceUnavailable(String),

    // ----- Source isolation -----
    /// A source query consumed more than its resource budget.
    #[error("Query budget exceeded: limit {limit}, attempted {attempted}")]
    BudgetExceeded { limit: u64, attempted: u64 },

    /// A source failed to answer.
    #[error("Source error: {0}")]
    Source(String),

    // ----- Registry -----
    /// The source registry is full.
    #[error("Source registry is full ({max} sources)")]
    TooManySources { max: usize },

    /// A source with the same name is already registered.
    #[error("Source {0} is already registered")]
    DuplicateSource(String),

    /// No source with the given name is registered.
    #[error("Source {0} not found")]
    SourceNotFound(String),

    // ----- Collaborators -----
    /// A custody move was refused.
    #[error("Custody error: {0}")]
    Custody(String),

    /// A synced total tried to move below its recorded value.
    #[error("Synced value cannot decrease: recorded {current}, proposed {proposed}")]
    NonMonotonic { current: u128, proposed: u128 },

    /// Fixed-point arithmetic left the representable range.
    #[error("Arithmetic overflow")]
    Overflow,

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TallyError {
    fn from(e: serde_json::Error) -> Self {
        TallyError::Serialization(e.to_string())
    }
}
