// crates/tally-keeper/src/state.rs
//
// Persisted keeper state.
//
// The position store, the hub's redemption ledger and reward pool, both
// simulated custodies, and the last block the keeper reached are written
// as one JSON document to
// `<data_dir>/ledger.json`. Writes go to a sibling temp file first and are
// renamed into place, so a crash never leaves a half-written snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tally_core::{Moment, TallyError};
use tally_hub::{HubParams, HubSnapshot, PointsHub};
use tally_staking::{InMemoryCustody, LedgerSnapshot, StakingEngine, StakingParams};

const STATE_FILE: &str = "ledger.json";

/// Errors raised while loading or saving keeper state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed state file {path}: {source}")]
    Format {
        path: String,
        source: serde_json::Error,
    },

    #[error("Ledger rejected the snapshot: {0}")]
    Ledger(#[from] TallyError),
}

/// Everything the keeper needs to resume where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeeperState {
    pub ledger: LedgerSnapshot,
    pub custody: InMemoryCustody,
    pub hub: HubSnapshot,
    pub reward_custody: InMemoryCustody,
    pub moment: Moment,
    /// Wall-clock time of the save, for operators.
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

impl KeeperState {
    /// Capture the engine, the hub, and the block they have reached.
    pub fn capture(engine: &StakingEngine, hub: &PointsHub, moment: Moment) -> Self {
        Self {
            ledger: engine.snapshot(),
            custody: engine.custody().clone(),
            hub: hub.snapshot(),
            reward_custody: hub.reward_custody().clone(),
            moment,
            saved_at: chrono::Utc::now(),
        }
    }

    /// Rebuild the engine and the hub, returning them with the saved moment.
    /// The hub comes back without sources; the caller registers them.
    pub fn into_parts(
        self,
        staking: StakingParams,
        hub: HubParams,
    ) -> Result<(StakingEngine, PointsHub, Moment), StateError> {
        let engine = StakingEngine::restore(self.ledger, staking, self.custody)?;
        let hub = PointsHub::restore(self.hub, hub, self.reward_custody)?;
        Ok((engine, hub, self.moment))
    }
}

/// Reads and writes `KeeperState` under a data directory.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Load the saved state, or `None` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<KeeperState>, StateError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
        let state = serde_json::from_str(&contents).map_err(|source| StateError::Format {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(state))
    }

    /// Write `state`, replacing any previous save.
    pub fn save(&self, state: &KeeperState) -> Result<(), StateError> {
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))?;

        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(state).map_err(|source| StateError::Format {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::write(&tmp, contents).map_err(|source| io_error(&tmp, source))?;
        fs::rename(&tmp, &path).map_err(|source| io_error(&path, source))?;

        tracing::info!(
            path = %path.display(),
            participants = state.ledger.accounts.len(),
            total_redeemed = state.hub.ledger.total(),
            block = state.moment.block,
            "keeper state saved"
        );
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.display().to_string(),
        source,
    }
}
