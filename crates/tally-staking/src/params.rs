// crates/tally-staking/src/params.rs
//
// Staking engine parameters. Loaded from the `[staking]` table of the
// keeper configuration or populated with defaults.

use serde::{Deserialize, Serialize};

use tally_core::TallyError;

use crate::units::MAX_RATE_PER_SECOND;

/// Tunable parameters of the staking engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// Points per second per unit of amount at 1.0x.
    #[serde(default = "default_rate_per_second")]
    pub rate_per_second: u64,

    /// Whether positions accrue at all.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Blocks that must pass since an account's marker before a
    /// checkpoint credits anything.
    #[serde(default = "default_min_checkpoint_blocks")]
    pub min_checkpoint_blocks: u64,

    /// Maximum participants per batch checkpoint.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Maximum open positions a participant may hold at once.
    #[serde(default = "default_max_positions")]
    pub max_positions_per_participant: usize,
}

fn default_rate_per_second() -> u64 {
    1
}

fn default_active() -> bool {
    true
}

fn default_min_checkpoint_blocks() -> u64 {
    1
}

fn default_max_batch_size() -> usize {
    50
}

fn default_max_positions() -> usize {
    100
}

impl Default for StakingParams {
    fn default() -> Self {
        Self {
            rate_per_second: default_rate_per_second(),
            active: default_active(),
            min_checkpoint_blocks: default_min_checkpoint_blocks(),
            max_batch_size: default_max_batch_size(),
            max_positions_per_participant: default_max_positions(),
        }
    }
}

impl StakingParams {
    /// Check the parameters are usable.
    ///
    /// # Errors
    /// `RateTooLarge` for a rate above `MAX_RATE_PER_SECOND`;
    /// `InvalidConfig` for a zero batch size or position cap.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.rate_per_second as u128 > MAX_RATE_PER_SECOND {
            return Err(TallyError::RateTooLarge {
                rate: self.rate_per_second as u128,
                max: MAX_RATE_PER_SECOND,
            });
        }
        if self.max_batch_size == 0 {
            return Err(TallyError::InvalidConfig(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_positions_per_participant == 0 {
            return Err(TallyError::InvalidConfig(
                "max_positions_per_participant must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
