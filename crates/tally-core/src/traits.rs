// crates/tally-core/src/traits.rs

use crate::budget::QueryBudget;
use crate::error::TallyError;
use crate::identity::ParticipantId;
use crate::time::Moment;

/// Capability exposed by every point-producing module to the aggregation hub.
///
/// Implemented by the staking engine adapter and the batch-sync grant
/// source in tally-hub, and by any sibling module plugged in later.
/// Implementations must be deterministic for a fixed `(state, at)`.
pub trait AccountingSource: Send + Sync {
    /// Human-readable, unique source name.
    fn name(&self) -> &str;

    /// Inactive sources are skipped by the hub.
    fn is_active(&self) -> bool;

    /// Points earned by `participant` as of `at`.
    ///
    /// Sources charge `budget` for their work and must return
    /// `TallyError::BudgetExceeded` instead of continuing past it.
    fn points(
        &self,
        participant: &ParticipantId,
        at: &Moment,
        budget: &mut QueryBudget,
    ) -> Result<u128, TallyError>;
}

/// Source of points forfeited outside the staking engine.
///
/// Reported values never decrease for a participant.
pub trait PenaltySource: Send + Sync {
    fn name(&self) -> &str;

    fn penalty(
        &self,
        participant: &ParticipantId,
        budget: &mut QueryBudget,
    ) -> Result<u128, TallyError>;
}

/// Custody of the underlying fungible balances.
///
/// Both moves are all-or-nothing: on `Err` no balance has changed.
pub trait BalanceCustody {
    /// Take `amount` from the participant into ledger custody.
    fn move_in(&mut self, participant: &ParticipantId, amount: u128) -> Result<(), TallyError>;

    /// Release `amount` from ledger custody to the participant.
    fn move_out(&mut self, participant: &ParticipantId, amount: u128) -> Result<(), TallyError>;
}
