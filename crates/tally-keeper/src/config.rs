// crates/tally-keeper/src/config.rs
//
// Runtime configuration for the Tally keeper.
// Loaded from a TOML file or populated with defaults.

use serde::Deserialize;
use std::fs;

use tally_hub::HubParams;
use tally_staking::StakingParams;

/// Runtime configuration for the keeper.
#[derive(Debug, Clone, Deserialize)]
pub struct KeeperConfig {
    /// Directory holding the ledger snapshot.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Wall-clock milliseconds between simulated blocks.
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,

    /// Ledger seconds that elapse per block.
    #[serde(default = "default_seconds_per_block")]
    pub seconds_per_block: u64,

    /// Run a checkpoint round every this many blocks.
    #[serde(default = "default_checkpoint_interval_blocks")]
    pub checkpoint_interval_blocks: u64,

    #[serde(default)]
    pub staking: StakingParams,

    #[serde(default)]
    pub hub: HubParams,
}

fn default_data_dir() -> String {
    "~/.tally/data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_block_interval_ms() -> u64 {
    12_000
}

fn default_seconds_per_block() -> u64 {
    12
}

fn default_checkpoint_interval_blocks() -> u64 {
    100
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            block_interval_ms: default_block_interval_ms(),
            seconds_per_block: default_seconds_per_block(),
            checkpoint_interval_blocks: default_checkpoint_interval_blocks(),
            staking: StakingParams::default(),
            hub: HubParams::default(),
        }
    }
}

impl KeeperConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// block pacing is zero.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: KeeperConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject pacing values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.checkpoint_interval_blocks == 0 {
            return Err("checkpoint_interval_blocks must be at least 1".to_string());
        }
        if self.block_interval_ms == 0 {
            return Err("block_interval_ms must be at least 1".to_string());
        }
        self.staking.validate().map_err(|e| e.to_string())
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path.to_string()
}
