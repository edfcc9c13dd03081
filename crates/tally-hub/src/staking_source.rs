// crates/tally-hub/src/staking_source.rs
//
// Exposes a shared staking engine to the hub as an accounting source.
//
// The engine lives behind Arc<RwLock<>> so write paths (open, close,
// checkpoint) and hub reads share one instance. Reads charge one budget
// unit for the account lookup and one per position scanned. A poisoned
// lock is reported as a source fault, which the hub contains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tally_core::{AccountingSource, BalanceCustody, Moment, ParticipantId, QueryBudget, TallyError};
use tally_staking::StakingEngine;

/// Accounting-source adapter over a shared `StakingEngine`.
pub struct StakingSource<C: BalanceCustody> {
    name: String,
    listed: AtomicBool,
    engine: Arc<RwLock<StakingEngine<C>>>,
}

impl<C: BalanceCustody> StakingSource<C> {
    pub fn new(name: impl Into<String>, engine: Arc<RwLock<StakingEngine<C>>>) -> Self {
        Self {
            name: name.into(),
            listed: AtomicBool::new(true),
            engine,
        }
    }

    /// Include or exclude this source from aggregation.
    ///
    /// Independent of the engine's accrual switch: an unlisted engine keeps
    /// accruing, a listed engine with accrual off still reports its folded points.
    pub fn set_listed(&self, listed: bool) {
        self.listed.store(listed, Ordering::Relaxed);
    }

    pub fn engine(&self) -> &Arc<RwLock<StakingEngine<C>>> {
        &self.engine
    }
}

impl<C> AccountingSource for StakingSource<C>
where
    C: BalanceCustody + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.listed.load(Ordering::Relaxed)
    }

    fn points(
        &self,
        participant: &ParticipantId,
        at: &Moment,
        budget: &mut QueryBudget,
    ) -> Result<u128, TallyError> {
        let engine = self
            .engine
            .read()
            .map_err(|_| TallyError::Source("staking engine lock poisoned".to_string()))?;
        engine.total_points_metered(participant, at.timestamp, budget)
    }
}
