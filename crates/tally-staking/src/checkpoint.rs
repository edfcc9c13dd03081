// crates/tally-staking/src/checkpoint.rs
//
// Checkpoint coordinator.
//
// A checkpoint folds accrual for every open position of an account up to
// the current instant and records the block as the account's marker. It is
// idempotent and harmless to the target, so anyone may checkpoint anyone;
// a keeper is expected to run the batch form periodically, but reads never
// depend on it.
//
// Anti-flash-loan gate: accrual is only credited once at least
// `min_checkpoint_blocks` blocks have passed since the marker was last set
// (by a checkpoint or a deposit). Otherwise the checkpoint records nothing
// and reports how many blocks remain. Inflating a balance and forcing a
// checkpoint inside the same block therefore captures nothing.

use serde::{Deserialize, Serialize};

use tally_core::{BalanceCustody, LedgerEvent, Moment, ParticipantId, TallyError};

use crate::accrual;
use crate::staking::StakingEngine;

/// Result of checkpointing one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointOutcome {
    /// Open positions were folded forward.
    Advanced {
        positions: usize,
        points_credited: u128,
    },
    /// The gate refused; nothing was recorded.
    Protected { blocks_remaining: u64 },
}

/// Result of a batch checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCheckpointReport {
    /// Participants advanced, with the points credited to each.
    pub advanced: Vec<(ParticipantId, u128)>,
    /// Participants held back by the gate, with the blocks remaining.
    pub protected: Vec<(ParticipantId, u64)>,
    /// Indexes of entries skipped for carrying the unset identity.
    pub skipped: Vec<usize>,
}

impl BatchCheckpointReport {
    pub fn points_credited(&self) -> u128 {
        self.advanced
            .iter()
            .map(|(_, points)| *points)
            .fold(0u128, u128::saturating_add)
    }
}

impl<C: BalanceCustody> StakingEngine<C> {
    /// Checkpoint one participant.
    ///
    /// # Errors
    /// `UnsetParticipant` for the all-zero identity. A gate refusal is not
    /// an error; it is reported as `CheckpointOutcome::Protected`.
    pub fn checkpoint_one(
        &mut self,
        participant: ParticipantId,
        now: Moment,
    ) -> Result<CheckpointOutcome, TallyError> {
        if participant.is_unset() {
            return Err(TallyError::UnsetParticipant);
        }
        Ok(self.checkpoint_account(participant, now))
    }

    /// Checkpoint a bounded list of participants.
    ///
    /// Unset identities are skipped and reported; they do not fail the batch.
    ///
    /// # Errors
    /// `BatchTooLarge` if the list exceeds `max_batch_size`; nothing is
    /// checkpointed in that case.
    pub fn checkpoint_many(
        &mut self,
        participants: &[ParticipantId],
        now: Moment,
    ) -> Result<BatchCheckpointReport, TallyError> {
        let max = self.params.max_batch_size;
        if participants.len() > max {
            return Err(TallyError::BatchTooLarge {
                len: participants.len(),
                max,
            });
        }

        let mut report = BatchCheckpointReport::default();
        for (index, participant) in participants.iter().enumerate() {
            if participant.is_unset() {
                tracing::debug!(index, "batch checkpoint skipped unset identity");
                self.events.push(LedgerEvent::CheckpointSkipped { index });
                report.skipped.push(index);
                continue;
            }
            match self.checkpoint_account(*participant, now) {
                CheckpointOutcome::Advanced {
                    points_credited, ..
                } => report.advanced.push((*participant, points_credited)),
                CheckpointOutcome::Protected { blocks_remaining } => {
                    report.protected.push((*participant, blocks_remaining))
                }
            }
        }

        tracing::debug!(
            block = now.block,
            advanced = report.advanced.len(),
            protected = report.protected.len(),
            skipped = report.skipped.len(),
            "batch checkpoint complete"
        );
        Ok(report)
    }

    /// Blocks left before `participant` can be checkpointed (0 if ready).
    pub fn blocks_until_checkpoint(&self, participant: &ParticipantId, block: u64) -> u64 {
        self.accounts
            .get(participant)
            .map(|account| {
                let elapsed = block.saturating_sub(account.last_checkpoint_block);
                self.params.min_checkpoint_blocks.saturating_sub(elapsed)
            })
            .unwrap_or(0)
    }

    fn checkpoint_account(&mut self, participant: ParticipantId, now: Moment) -> CheckpointOutcome {
        let min_blocks = self.params.min_checkpoint_blocks;
        let config = self.config;

        // Unknown participants have nothing to fold and get no marker.
        let Some(account) = self.accounts.get_mut(&participant) else {
            return CheckpointOutcome::Advanced {
                positions: 0,
                points_credited: 0,
            };
        };

        let elapsed = now.block.saturating_sub(account.last_checkpoint_block);
        if elapsed < min_blocks {
            let blocks_remaining = min_blocks - elapsed;
            tracing::warn!(
                participant = %participant,
                blocks_remaining,
                "checkpoint protection triggered"
            );
            self.events.push(LedgerEvent::CheckpointProtected {
                participant,
                blocks_remaining,
            });
            return CheckpointOutcome::Protected { blocks_remaining };
        }

        let mut positions = 0usize;
        let mut points_credited = 0u128;
        for position in account.positions.iter_mut().filter(|p| p.is_open) {
            points_credited =
                points_credited.saturating_add(accrual::accrue(position, &config, now.timestamp));
            positions += 1;
        }
        account.last_checkpoint_block = now.block;
        account.last_checkpoint_at = now.timestamp;

        tracing::debug!(
            participant = %participant,
            positions,
            points_credited,
            block = now.block,
            "checkpoint advanced"
        );
        self.events.push(LedgerEvent::CheckpointAdvanced {
            participant,
            positions,
            points_credited,
            block: now.block,
        });

        CheckpointOutcome::Advanced {
            positions,
            points_credited,
        }
    }
}
