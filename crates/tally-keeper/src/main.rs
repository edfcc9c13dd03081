// crates/tally-keeper/src/main.rs
//
// Binary entrypoint for the Tally keeper.
//
// Initializes tracing, parses CLI arguments, loads configuration, restores
// the staking and redemption snapshot, wires the staking engine into the
// points hub, and runs the block scheduler until Ctrl-C. The snapshot is
// saved on shutdown.

mod config;
mod events;
mod scheduler;
mod state;

use std::sync::{Arc, RwLock};

use clap::{Parser, Subcommand};
use config::{expand_tilde, KeeperConfig};
use events::log_events;
use scheduler::CheckpointScheduler;
use state::{KeeperState, StateStore};

use tally_core::Moment;
use tally_hub::{PointsHub, StakingSource};
use tally_staking::{InMemoryCustody, StakingEngine};

/// Tally keeper: drives checkpoints and persists the points ledger.
#[derive(Parser, Debug)]
#[command(name = "tally-keeper", version = "0.1.0", about = "Tally points ledger keeper")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "~/.tally/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the block scheduler until interrupted.
    Run,
    /// Print the points a fresh position would hold after a holding period.
    Estimate {
        /// Staked amount in base units.
        #[arg(long)]
        amount: u128,
        /// Commitment length in days (0 for uncommitted).
        #[arg(long, default_value_t = 0)]
        days: u32,
        /// Holding period in seconds.
        #[arg(long)]
        hold_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found.
    let config_path = expand_tilde(&args.config);
    let (config, load_error) = match KeeperConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (KeeperConfig::default(), Some(e.to_string())),
    };

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    match load_error {
        None => tracing::info!("Loaded configuration from {}", config_path),
        Some(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            config_path,
            e
        ),
    }

    match args.command {
        Command::Run => run(config).await,
        Command::Estimate {
            amount,
            days,
            hold_secs,
        } => {
            let engine = StakingEngine::new(config.staking, InMemoryCustody::new())?;
            let points = engine.estimate(amount, days, hold_secs)?;
            println!(
                "{} staked for {}s ({} day commitment) accrues {} points",
                amount, hold_secs, days, points
            );
            Ok(())
        }
    }
}

async fn run(config: KeeperConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Tally keeper v0.1.0");
    tracing::info!("Data directory: {}", config.data_dir);
    tracing::info!(
        "Block pacing: {}ms wall clock, {}s ledger time",
        config.block_interval_ms,
        config.seconds_per_block
    );

    let store = StateStore::new(expand_tilde(&config.data_dir));
    let (engine, mut hub, start) = match store.load()? {
        Some(saved) => {
            tracing::info!(block = saved.moment.block, "restoring ledger snapshot");
            saved.into_parts(config.staking.clone(), config.hub.clone())?
        }
        None => {
            tracing::info!("No ledger snapshot found, starting empty");
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            (
                StakingEngine::new(config.staking.clone(), InMemoryCustody::new())?,
                PointsHub::new(config.hub.clone(), InMemoryCustody::new()),
                Moment::new(now, 0),
            )
        }
    };
    let engine = Arc::new(RwLock::new(engine));

    // The hub sees the staking engine as its first accounting source.
    hub.register_source(Arc::new(StakingSource::new("staking", engine.clone())))?;
    log_events(&hub.drain_events());
    tracing::info!(
        sources = ?hub.source_names(),
        redemption_enabled = hub.settings().enabled,
        total_redeemed = hub.total_redeemed(),
        pool = hub.pool_balance(),
        "points hub ready"
    );

    let mut scheduler = CheckpointScheduler::new(
        engine.clone(),
        start,
        config.seconds_per_block,
        config.checkpoint_interval_blocks,
        config.block_interval_ms,
    );
    scheduler.run().await?;
    let reached = scheduler.moment();

    let guard = engine
        .read()
        .map_err(|_| "staking engine lock poisoned")?;
    let participants: Vec<_> = guard.participants().copied().collect();
    drop(guard);
    let hub_total = participants
        .iter()
        .map(|p| hub.total_points(p, &reached))
        .fold(0u128, u128::saturating_add);
    tracing::info!(
        participants = participants.len(),
        hub_total,
        block = reached.block,
        "final ledger totals"
    );

    let state = {
        let guard = engine
            .read()
            .map_err(|_| "staking engine lock poisoned")?;
        KeeperState::capture(&guard, &hub, reached)
    };
    store.save(&state)?;
    tracing::info!("Tally keeper stopped");
    Ok(())
}
