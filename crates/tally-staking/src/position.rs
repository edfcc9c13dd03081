// crates/tally-staking/src/position.rs
//
// Position store records.
//
// A Position is one deposit by one participant. Its accrual snapshot
// (`accrued_value` as of `last_accrual_at`) only moves forward. Committed
// positions never change amount. Closed positions freeze their accrued
// value permanently and are kept for history; a new deposit always opens a
// new position.

use serde::{Deserialize, Serialize};

use tally_core::{ParticipantId, PositionId};

use crate::multiplier::boost_for_days;
use crate::units::SECONDS_PER_DAY;

/// Whether a position carries a time commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionKind {
    /// Withdrawable at any time, always accrues at 1.0x.
    Uncommitted,
    /// Boosted until `commitment_ends_at`, penalized on early exit.
    Committed,
}

/// A single accrual position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Index of this position inside the owner's account.
    pub id: PositionId,
    pub owner: ParticipantId,
    /// Deposited quantity.
    pub amount: u128,
    /// Points folded in as of `last_accrual_at`.
    pub accrued_value: u128,
    pub opened_at: u64,
    /// End of the commitment window; 0 for uncommitted positions.
    pub commitment_ends_at: u64,
    pub last_accrual_at: u64,
    /// Original commitment length in days. Kept after expiry.
    pub commitment_days: u32,
    pub kind: PositionKind,
    pub is_open: bool,
    /// Set once the position is closed.
    pub closed_at: Option<u64>,
    /// Points forfeited at close.
    pub penalty_paid: u128,
}

impl Position {
    /// New uncommitted position opened at `now`.
    pub fn uncommitted(id: PositionId, owner: ParticipantId, amount: u128, now: u64) -> Self {
        Self {
            id,
            owner,
            amount,
            accrued_value: 0,
            opened_at: now,
            commitment_ends_at: 0,
            last_accrual_at: now,
            commitment_days: 0,
            kind: PositionKind::Uncommitted,
            is_open: true,
            closed_at: None,
            penalty_paid: 0,
        }
    }

    /// New committed position opened at `now` for `days` days.
    pub fn committed(
        id: PositionId,
        owner: ParticipantId,
        amount: u128,
        days: u32,
        now: u64,
    ) -> Self {
        Self {
            commitment_ends_at: now.saturating_add(days as u64 * SECONDS_PER_DAY),
            commitment_days: days,
            kind: PositionKind::Committed,
            ..Self::uncommitted(id, owner, amount, now)
        }
    }

    pub fn is_committed(&self) -> bool {
        self.kind == PositionKind::Committed
    }

    /// Length of the commitment window in seconds (0 when uncommitted).
    pub fn commitment_secs(&self) -> u64 {
        match self.kind {
            PositionKind::Uncommitted => 0,
            PositionKind::Committed => self.commitment_ends_at.saturating_sub(self.opened_at),
        }
    }

    /// Boost from the stored commitment length, ignoring expiry.
    pub fn committed_boost(&self) -> u128 {
        match self.kind {
            PositionKind::Uncommitted => boost_for_days(0),
            PositionKind::Committed => boost_for_days(self.commitment_days),
        }
    }

    /// `true` while a committed position is still inside its commitment.
    pub fn is_locked_at(&self, now: u64) -> bool {
        self.is_committed() && now < self.commitment_ends_at
    }

    /// Seconds left in the commitment at `now`.
    pub fn remaining_commitment(&self, now: u64) -> u64 {
        if self.is_committed() {
            self.commitment_ends_at.saturating_sub(now)
        } else {
            0
        }
    }
}

/// All positions of one participant plus the gate marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantAccount {
    pub positions: Vec<Position>,
    /// Sum of `amount` over open positions.
    pub total_open_amount: u128,
    /// Points frozen in closed positions, so reads skip closed history.
    #[serde(default)]
    pub retired_points: u128,
    /// Block at which this account was last advanced or last received a deposit.
    pub last_checkpoint_block: u64,
    /// Timestamp of the last successful checkpoint.
    pub last_checkpoint_at: u64,
}

impl ParticipantAccount {
    pub fn new(block: u64) -> Self {
        Self {
            last_checkpoint_block: block,
            ..Self::default()
        }
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        usize::try_from(id).ok().and_then(|i| self.positions.get(i))
    }

    pub fn position_mut(&mut self, id: PositionId) -> Option<&mut Position> {
        usize::try_from(id).ok().and_then(|i| self.positions.get_mut(i))
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open)
    }

    pub fn closed_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| !p.is_open)
    }

    pub fn open_count(&self) -> usize {
        self.open_positions().count()
    }

    pub fn next_id(&self) -> PositionId {
        self.positions.len() as PositionId
    }
}

/// Read-only view of a position at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub position: Position,
    /// `accrued_value` plus points since the last accrual.
    pub current_points: u128,
    /// Boost applying at the query instant.
    pub effective_boost: u128,
    /// Seconds of commitment left.
    pub commitment_remaining: u64,
    /// Points a close at the query instant would forfeit.
    pub pending_penalty: u128,
}
