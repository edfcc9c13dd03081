// crates/tally-hub/src/bulkhead.rs
//
// Isolated source queries.
//
// Every call into an accounting source goes through `query_source`, which
// converts any failure into a typed zero-contribution outcome:
//   - the source reports an error          -> Failed
//   - the source runs past its budget      -> BudgetExceeded
//   - the source panics                    -> Panicked
//   - the source reports > MAX_SOURCE_POINTS -> Malformed
//   - the source is switched off           -> Inactive
// The budget is cooperative: sources charge it for the work they do. The
// panic guard and the range check hold regardless of source behaviour.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use tally_core::{AccountingSource, Moment, ParticipantId, PenaltySource, QueryBudget, TallyError};

/// Maximum number of registered accounting sources.
pub const MAX_SOURCES: usize = 10;

/// Largest report accepted from one source. Summing `MAX_SOURCES` such
/// reports cannot overflow.
pub const MAX_SOURCE_POINTS: u128 = u128::MAX / MAX_SOURCES as u128;

/// What a single source query produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceOutcome {
    /// A valid report, counted toward the total.
    Counted(u128),
    /// The source is switched off.
    Inactive,
    /// The source returned an error.
    Failed(String),
    /// The source exceeded its query budget.
    BudgetExceeded,
    /// The source reported an out-of-range value.
    Malformed(u128),
    /// The source panicked.
    Panicked,
}

impl SourceOutcome {
    /// Points this outcome adds to the aggregate.
    pub fn contribution(&self) -> u128 {
        match self {
            SourceOutcome::Counted(points) => *points,
            _ => 0,
        }
    }

    pub fn is_fault(&self) -> bool {
        !matches!(self, SourceOutcome::Counted(_) | SourceOutcome::Inactive)
    }
}

/// One line of a points breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub name: String,
    pub outcome: SourceOutcome,
    /// Budget units the source consumed.
    pub units_consumed: u64,
}

/// Query one accounting source inside the bulkhead.
pub fn query_source(
    name: &str,
    source: &dyn AccountingSource,
    participant: &ParticipantId,
    at: &Moment,
    budget_limit: u64,
) -> SourceReport {
    let guarded = panic::catch_unwind(AssertUnwindSafe(|| {
        if !source.is_active() {
            return (SourceOutcome::Inactive, 0);
        }
        let mut budget = QueryBudget::new(budget_limit);
        let outcome = match source.points(participant, at, &mut budget) {
            Ok(points) if points > MAX_SOURCE_POINTS => SourceOutcome::Malformed(points),
            Ok(points) => SourceOutcome::Counted(points),
            Err(TallyError::BudgetExceeded { .. }) => SourceOutcome::BudgetExceeded,
            Err(e) => SourceOutcome::Failed(e.to_string()),
        };
        (outcome, budget.consumed())
    }));

    let (outcome, units_consumed) = guarded.unwrap_or((SourceOutcome::Panicked, budget_limit));
    if outcome.is_fault() {
        tracing::warn!(
            source = name,
            participant = %participant,
            outcome = ?outcome,
            "accounting source contained, contributing zero"
        );
    }

    SourceReport {
        name: name.to_string(),
        outcome,
        units_consumed,
    }
}

/// Query the penalty source inside the bulkhead.
///
/// # Errors
/// `PenaltySourceUnavailable` for any failure, including a panic. Callers
/// treat this as "claimable unknown" rather than as zero penalty.
pub fn query_penalty(
    name: &str,
    source: &dyn PenaltySource,
    participant: &ParticipantId,
    budget_limit: u64,
) -> Result<u128, TallyError> {
    let guarded = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut budget = QueryBudget::new(budget_limit);
        source.penalty(participant, &mut budget)
    }));

    match guarded {
        Ok(Ok(penalty)) => Ok(penalty),
        Ok(Err(e)) => {
            tracing::warn!(source = name, error = %e, "penalty source failed");
            Err(TallyError::PenaltySourceUnavailable(e.to_string()))
        }
        Err(_) => {
            tracing::warn!(source = name, "penalty source panicked");
            Err(TallyError::PenaltySourceUnavailable(format!(
                "{} panicked",
                name
            )))
        }
    }
}
