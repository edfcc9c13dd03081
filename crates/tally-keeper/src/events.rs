// crates/tally-keeper/src/events.rs
//
// Forwarding of drained ledger events to the keeper's log.
//
// The engine and hub buffer `LedgerEvent`s; the scheduler drains them after
// each block and hands them here so operators see one structured line per
// state change.

use tally_core::LedgerEvent;

/// Log each event at a level matching its weight. Returns the number logged.
pub fn log_events(events: &[LedgerEvent]) -> usize {
    for event in events {
        match event {
            LedgerEvent::PositionOpened {
                participant,
                position_id,
                amount,
                commitment_days,
                boost,
                ..
            } => tracing::info!(
                participant = %participant,
                position_id,
                amount,
                commitment_days,
                boost,
                "position opened"
            ),
            LedgerEvent::PositionClosed {
                participant,
                position_id,
                amount,
                points_retained,
                penalty,
                capped,
                ..
            } => tracing::info!(
                participant = %participant,
                position_id,
                amount,
                points_retained,
                penalty,
                capped,
                "position closed"
            ),
            LedgerEvent::CheckpointAdvanced {
                participant,
                positions,
                points_credited,
                block,
            } => tracing::debug!(
                participant = %participant,
                positions,
                points_credited,
                block,
                "checkpoint advanced"
            ),
            LedgerEvent::CheckpointProtected {
                participant,
                blocks_remaining,
            } => tracing::debug!(participant = %participant, blocks_remaining, "checkpoint protected"),
            LedgerEvent::CheckpointSkipped { index } => {
                tracing::warn!(index, "checkpoint batch entry skipped")
            }
            other => tracing::info!(event = ?other, "ledger event"),
        }
    }
    events.len()
}
