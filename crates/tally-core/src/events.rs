// crates/tally-core/src/events.rs
//
// Ledger events emitted by state-changing operations.
//
// Components buffer events in order as they happen; the host drains the
// buffer after each call (the keeper logs them). A protection-triggered
// checkpoint is reported here rather than as an error. The buffer is
// bounded: a host that never drains loses the oldest events, not memory.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::identity::{ParticipantId, PositionId};

/// Events emitted by the staking engine and the aggregation hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A new position was opened.
    PositionOpened {
        participant: ParticipantId,
        position_id: PositionId,
        amount: u128,
        /// Commitment length in days, 0 for uncommitted positions.
        commitment_days: u32,
        /// Boost in effect at open, in `BOOST_BASE` units.
        boost: u128,
        timestamp: u64,
    },
    /// A position was closed and its principal returned.
    PositionClosed {
        participant: ParticipantId,
        position_id: PositionId,
        amount: u128,
        /// Points kept by the position after any penalty.
        points_retained: u128,
        /// Points forfeited to the early-exit penalty.
        penalty: u128,
        /// The theoretical penalty exceeded accrued points and was capped.
        capped: bool,
        timestamp: u64,
    },
    /// A participant's open positions were folded forward.
    CheckpointAdvanced {
        participant: ParticipantId,
        positions: usize,
        points_credited: u128,
        block: u64,
    },
    /// The anti-flash-loan gate refused a checkpoint.
    CheckpointProtected {
        participant: ParticipantId,
        blocks_remaining: u64,
    },
    /// A batch checkpoint entry was skipped (unset identity).
    CheckpointSkipped { index: usize },
    /// Accrual configuration changed.
    AccrualConfigUpdated {
        version: u64,
        rate_per_second: u128,
        active: bool,
    },
    /// Points were converted into reward units.
    Redeemed {
        participant: ParticipantId,
        points: u128,
        reward: u128,
    },
    /// Redemption settings changed.
    RedemptionConfigUpdated {
        exchange_rate: u128,
        enabled: bool,
        max_per_tx: Option<u128>,
    },
    /// An accounting source joined the hub.
    SourceRegistered { name: String },
    /// An accounting source left the hub.
    SourceRemoved { name: String },
}

/// Default number of undrained events a component keeps.
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

/// Bounded, ordered buffer of ledger events.
///
/// Once `capacity` events are waiting, each push evicts the oldest one and
/// bumps the dropped counter. Hosts should call [`EventLog::drain`] after
/// every state-changing call to see the full stream.
#[derive(Debug, Clone)]
pub struct EventLog {
    buffer: VecDeque<LedgerEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: LedgerEvent) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        self.buffer.push_back(event);
    }

    /// Take the buffered events, oldest first.
    pub fn drain(&mut self) -> Vec<LedgerEvent> {
        self.buffer.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events evicted unread since this log was created.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
