// crates/tally-hub/src/sources.rs
//
// Points and penalty add-ons fed by an off-chain batch sync.
//
// The batch-sync subsystem computes cumulative per-participant totals off
// chain and pushes them in batches. These types hold the latest totals and
// expose them through the hub's narrow read interfaces. Totals for a
// participant never decrease; a batch that would lower any entry is
// rejected whole.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use tally_core::{AccountingSource, Moment, ParticipantId, PenaltySource, QueryBudget, TallyError};

/// Cumulative totals keyed by participant, updated in monotonic batches.
#[derive(Debug, Default)]
struct MonotonicTotals {
    totals: RwLock<HashMap<ParticipantId, u128>>,
    batches_applied: AtomicU64,
}

impl MonotonicTotals {
    fn get(&self, participant: &ParticipantId) -> Result<u128, TallyError> {
        let totals = self
            .totals
            .read()
            .map_err(|_| TallyError::Source("synced totals lock poisoned".to_string()))?;
        Ok(totals.get(participant).copied().unwrap_or(0))
    }

    fn apply(&self, entries: &[(ParticipantId, u128)]) -> Result<usize, TallyError> {
        let mut totals = self
            .totals
            .write()
            .map_err(|_| TallyError::Source("synced totals lock poisoned".to_string()))?;

        // Validate the whole batch first so a rejection changes nothing.
        let mut staged: HashMap<ParticipantId, u128> = HashMap::new();
        for (participant, proposed) in entries {
            if participant.is_unset() {
                return Err(TallyError::UnsetParticipant);
            }
            let current = staged
                .get(participant)
                .or_else(|| totals.get(participant))
                .copied()
                .unwrap_or(0);
            if *proposed < current {
                return Err(TallyError::NonMonotonic {
                    current,
                    proposed: *proposed,
                });
            }
            staged.insert(*participant, *proposed);
        }

        let updated = staged.len();
        totals.extend(staged);
        self.batches_applied.fetch_add(1, Ordering::Relaxed);
        Ok(updated)
    }
}

/// Accounting source for points granted by the batch sync.
#[derive(Debug)]
pub struct SyncedPointsSource {
    name: String,
    active: AtomicBool,
    grants: MonotonicTotals,
}

impl SyncedPointsSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: AtomicBool::new(true),
            grants: MonotonicTotals::default(),
        }
    }

    /// Apply a batch of cumulative grant totals.
    ///
    /// Returns the number of participants updated.
    ///
    /// # Errors
    /// `NonMonotonic` if any entry lowers a recorded total, `UnsetParticipant`
    /// for an all-zero identity. The batch is then ignored entirely.
    pub fn apply_grants(&self, entries: &[(ParticipantId, u128)]) -> Result<usize, TallyError> {
        let updated = self.grants.apply(entries)?;
        tracing::info!(source = %self.name, updated, "points grants synced");
        Ok(updated)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn batches_applied(&self) -> u64 {
        self.grants.batches_applied.load(Ordering::Relaxed)
    }
}

impl AccountingSource for SyncedPointsSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn points(
        &self,
        participant: &ParticipantId,
        _at: &Moment,
        budget: &mut QueryBudget,
    ) -> Result<u128, TallyError> {
        budget.charge(1)?;
        self.grants.get(participant)
    }
}

/// Penalty add-on fed by the batch sync.
#[derive(Debug)]
pub struct SyncedPenaltyLedger {
    name: String,
    penalties: MonotonicTotals,
}

impl SyncedPenaltyLedger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            penalties: MonotonicTotals::default(),
        }
    }

    /// Apply a batch of cumulative penalty totals.
    ///
    /// # Errors
    /// `NonMonotonic` if any entry would lower a recorded penalty.
    pub fn apply_penalties(&self, entries: &[(ParticipantId, u128)]) -> Result<usize, TallyError> {
        let updated = self.penalties.apply(entries)?;
        tracing::info!(source = %self.name, updated, "penalties synced");
        Ok(updated)
    }
}

impl PenaltySource for SyncedPenaltyLedger {
    fn name(&self) -> &str {
        &self.name
    }

    fn penalty(&self, participant: &ParticipantId, budget: &mut QueryBudget) -> Result<u128, TallyError> {
        budget.charge(1)?;
        self.penalties.get(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> ParticipantId {
        ParticipantId::new([1u8; 32])
    }

    fn bob() -> ParticipantId {
        ParticipantId::new([2u8; 32])
    }

    fn read(source: &SyncedPointsSource, who: &ParticipantId) -> u128 {
        source
            .points(who, &Moment::default(), &mut QueryBudget::unlimited())
            .unwrap()
    }

    #[test]
    fn test_grants_apply_and_read() {
        let source = SyncedPointsSource::new("offchain");
        assert_eq!(source.apply_grants(&[(alice(), 100), (bob(), 5)]).unwrap(), 2);
        assert_eq!(read(&source, &alice()), 100);
        assert_eq!(read(&source, &bob()), 5);
        assert_eq!(source.batches_applied(), 1);
    }

    #[test]
    fn test_grants_can_grow() {
        let source = SyncedPointsSource::new("offchain");
        source.apply_grants(&[(alice(), 100)]).unwrap();
        source.apply_grants(&[(alice(), 150)]).unwrap();
        assert_eq!(read(&source, &alice()), 150);
    }

    #[test]
    fn test_decreasing_batch_rejected_whole() {
        let source = SyncedPointsSource::new("offchain");
        source.apply_grants(&[(alice(), 100)]).unwrap();
        let result = source.apply_grants(&[(bob(), 10), (alice(), 90)]);
        assert_eq!(
            result,
            Err(TallyError::NonMonotonic {
                current: 100,
                proposed: 90
            })
        );
        assert_eq!(read(&source, &bob()), 0);
        assert_eq!(read(&source, &alice()), 100);
        assert_eq!(source.batches_applied(), 1);
    }

    #[test]
    fn test_duplicate_entries_within_batch_must_not_decrease() {
        let source = SyncedPointsSource::new("offchain");
        assert!(source.apply_grants(&[(alice(), 50), (alice(), 40)]).is_err());
        assert_eq!(read(&source, &alice()), 0);
    }

    #[test]
    fn test_unset_identity_rejected() {
        let source = SyncedPointsSource::new("offchain");
        assert_eq!(
            source.apply_grants(&[(ParticipantId::UNSET, 1)]),
            Err(TallyError::UnsetParticipant)
        );
    }

    #[test]
    fn test_inactive_flag() {
        let source = SyncedPointsSource::new("offchain");
        assert!(source.is_active());
        source.set_active(false);
        assert!(!source.is_active());
    }

    #[test]
    fn test_penalties_only_increase() {
        let ledger = SyncedPenaltyLedger::new("penalties");
        ledger.apply_penalties(&[(alice(), 30)]).unwrap();
        assert!(ledger.apply_penalties(&[(alice(), 29)]).is_err());
        let penalty = ledger
            .penalty(&alice(), &mut QueryBudget::unlimited())
            .unwrap();
        assert_eq!(penalty, 30);
    }
}
