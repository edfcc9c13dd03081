// crates/tally-core/src/time.rs
//
// Explicit time for ledger operations.
//
// Nothing in the ledger reads a clock. Every operation is handed a Moment
// carrying the wall-clock second (drives accrual) and the block height, a
// coarse counter that advances once per unit of external progress (drives
// the anti-flash-loan gate).

use serde::{Deserialize, Serialize};

/// A point in ledger time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Moment {
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Block height (monotonic progress counter).
    pub block: u64,
}

impl Moment {
    pub fn new(timestamp: u64, block: u64) -> Self {
        Self { timestamp, block }
    }

    /// The same block height, `secs` seconds later.
    pub fn plus_secs(&self, secs: u64) -> Self {
        Self {
            timestamp: self.timestamp.saturating_add(secs),
            block: self.block,
        }
    }

    /// Advance by `blocks` blocks of `secs_per_block` seconds each.
    pub fn advance_blocks(&self, blocks: u64, secs_per_block: u64) -> Self {
        Self {
            timestamp: self
                .timestamp
                .saturating_add(blocks.saturating_mul(secs_per_block)),
            block: self.block.saturating_add(blocks),
        }
    }
}
