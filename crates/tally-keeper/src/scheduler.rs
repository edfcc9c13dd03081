// crates/tally-keeper/src/scheduler.rs
//
// Block scheduler for the Tally keeper.
//
// Simulates block progression at a configurable interval. Every
// `checkpoint_interval_blocks` blocks it folds accrual for every known
// participant, in chunks no larger than the engine's `max_batch_size`.
// Participants still inside their flash-loan window are reported as
// protected and retried on the next round.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tally_core::{Moment, ParticipantId, TallyError};
use tally_staking::StakingEngine;

use crate::events::log_events;

/// Totals for one checkpoint round across all chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub block: u64,
    pub chunks: usize,
    pub advanced: usize,
    pub protected: usize,
    pub skipped: usize,
    pub points_credited: u128,
}

/// Advances simulated blocks and runs periodic checkpoint rounds.
pub struct CheckpointScheduler {
    engine: Arc<RwLock<StakingEngine>>,
    moment: Moment,
    seconds_per_block: u64,
    checkpoint_interval_blocks: u64,
    block_interval: Duration,
}

impl CheckpointScheduler {
    pub fn new(
        engine: Arc<RwLock<StakingEngine>>,
        start: Moment,
        seconds_per_block: u64,
        checkpoint_interval_blocks: u64,
        block_interval_ms: u64,
    ) -> Self {
        Self {
            engine,
            moment: start,
            seconds_per_block,
            checkpoint_interval_blocks: checkpoint_interval_blocks.max(1),
            block_interval: Duration::from_millis(block_interval_ms),
        }
    }

    /// The block and timestamp the scheduler has reached.
    pub fn moment(&self) -> Moment {
        self.moment
    }

    /// Run until Ctrl-C.
    pub async fn run(&mut self) -> Result<(), TallyError> {
        tracing::info!(
            block = self.moment.block,
            checkpoint_interval_blocks = self.checkpoint_interval_blocks,
            seconds_per_block = self.seconds_per_block,
            "checkpoint scheduler started"
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!(block = self.moment.block, "checkpoint scheduler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.block_interval) => {
                    self.advance_block()?;
                }
            }
        }

        Ok(())
    }

    /// Advance one block, running a checkpoint round on interval boundaries.
    pub fn advance_block(&mut self) -> Result<Option<RoundSummary>, TallyError> {
        self.moment = self.moment.advance_blocks(1, self.seconds_per_block);

        if self.moment.block % self.checkpoint_interval_blocks != 0 {
            tracing::trace!(block = self.moment.block, "block");
            return Ok(None);
        }

        let summary = self.checkpoint_round()?;
        tracing::info!(
            block = summary.block,
            chunks = summary.chunks,
            advanced = summary.advanced,
            protected = summary.protected,
            skipped = summary.skipped,
            points_credited = summary.points_credited,
            "checkpoint round complete"
        );
        Ok(Some(summary))
    }

    /// Checkpoint every known participant at the current moment.
    pub fn checkpoint_round(&mut self) -> Result<RoundSummary, TallyError> {
        let mut engine = self
            .engine
            .write()
            .map_err(|_| TallyError::Source("staking engine lock poisoned".to_string()))?;

        let participants: Vec<ParticipantId> = engine.participants().copied().collect();
        let chunk_size = engine.params().max_batch_size.max(1);

        let mut summary = RoundSummary {
            block: self.moment.block,
            ..RoundSummary::default()
        };
        for chunk in participants.chunks(chunk_size) {
            let report = engine.checkpoint_many(chunk, self.moment)?;
            summary.chunks += 1;
            summary.advanced += report.advanced.len();
            summary.protected += report.protected.len();
            summary.skipped += report.skipped.len();
            summary.points_credited = summary
                .points_credited
                .saturating_add(report.points_credited());
            // Drain per chunk so a large round never fills the event buffer.
            log_events(&engine.drain_events());
        }

        Ok(summary)
    }
}
