// crates/tally-core/src/budget.rs
//
// Resource ceiling for a single accounting-source query.
//
// The aggregation hub hands each source a fresh budget. Sources charge it
// for the work they do (one unit per record scanned, by convention). Going
// past the limit fails the query, and the hub counts that source as zero.

use crate::error::TallyError;

/// Metered work allowance for one source query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryBudget {
    limit: u64,
    consumed: u64,
}

impl QueryBudget {
    pub fn new(limit: u64) -> Self {
        Self { limit, consumed: 0 }
    }

    /// A budget that never runs out. Used for direct, non-aggregated reads.
    pub fn unlimited() -> Self {
        Self::new(u64::MAX)
    }

    /// Consume `units` of work.
    ///
    /// # Errors
    /// Returns `TallyError::BudgetExceeded` if the charge would pass the limit.
    /// A charge whose running total leaves the u64 range also fails. A
    /// failed charge consumes nothing.
    pub fn charge(&mut self, units: u64) -> Result<(), TallyError> {
        match self.consumed.checked_add(units) {
            Some(attempted) if attempted <= self.limit => {
                self.consumed = attempted;
                Ok(())
            }
            attempted => Err(TallyError::BudgetExceeded {
                limit: self.limit,
                attempted: attempted.unwrap_or(u64::MAX),
            }),
        }
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.consumed
    }
}
