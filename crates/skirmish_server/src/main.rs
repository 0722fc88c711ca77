//! Skirmish match server.
//!
//! # Usage
//!
//! ```bash
//! # Host one AI-vs-AI match in real time and print the report
//! cargo run -p skirmish_server -- run --seed 7 --blue hard --red easy
//!
//! # Same, but as fast as possible with a tick limit
//! cargo run -p skirmish_server -- run --tick-rate 1000 --max-ticks 6000
//!
//! # Check that a seed replays to the same state
//! cargo run -p skirmish_server -- verify --seed 12345 --runs 5
//! ```
//!
//! Reports go to stdout as JSON, logs to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skirmish_core::ai::Difficulty;
use skirmish_core::components::PlayerId;
use skirmish_core::config::MatchConfig;
use skirmish_core::map_generation::MapConfig;
use skirmish_core::simulation::{Simulation, TICK_RATE};
use skirmish_server::{MatchServer, ServerConfig, ServerError};

#[derive(Parser)]
#[command(name = "skirmish_server")]
#[command(about = "Headless host for skirmish matches")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a single match until it ends
    Run {
        /// Match config (RON); overrides the flags below
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Match seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Map edge length in tiles
        #[arg(long, default_value = "64")]
        size: u32,

        /// Difficulty of player 0
        #[arg(long, default_value = "medium")]
        blue: Difficulty,

        /// Difficulty of player 1
        #[arg(long, default_value = "medium")]
        red: Difficulty,

        /// Ticks per second
        #[arg(long, default_value_t = TICK_RATE)]
        tick_rate: u32,

        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Also print each player's final snapshot
        #[arg(long)]
        snapshots: bool,
    },

    /// Run the same seed several times and compare final states
    Verify {
        /// Match seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run
        #[arg(short, long, default_value = "3000")]
        ticks: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            seed,
            size,
            blue,
            red,
            tick_rate,
            max_ticks,
            snapshots,
        } => {
            let match_config = match config {
                Some(path) => MatchConfig::load(path).map_err(ServerError::from),
                None => {
                    let map = MapConfig {
                        width: size,
                        height: size,
                        ..MapConfig::default()
                    };
                    Ok(MatchConfig::ai_vs_ai(blue, red).with_map(map).with_seed(seed))
                }
            };
            let server_config = ServerConfig {
                tick_rate,
                max_ticks,
                ..ServerConfig::default()
            };
            match match_config {
                Ok(match_config) => cmd_run(&match_config, server_config, snapshots).await,
                Err(e) => Err(e),
            }
        }
        Commands::Verify { seed, runs, ticks } => cmd_verify(seed, runs, ticks),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn cmd_run(
    match_config: &MatchConfig,
    server_config: ServerConfig,
    snapshots: bool,
) -> Result<(), ServerError> {
    let mut server = MatchServer::new(server_config)?;
    let id = server.create_match(match_config)?;

    let finals = if snapshots {
        let handle = server.get(id).ok_or(ServerError::UnknownMatch(id))?;
        let mut outcome = handle.outcome();
        // The match ends either with an outcome or at the tick limit; only
        // the former changes this channel.
        let _ = outcome.changed().await;
        [PlayerId(0), PlayerId(1)].map(|p| handle.snapshot(p))
    } else {
        [None, None]
    };

    let report = server.wait(id).await?;
    print_json(&report);
    for snapshot in finals.iter().flatten() {
        print_json(snapshot);
    }
    Ok(())
}

fn cmd_verify(seed: u64, runs: u32, ticks: u64) -> Result<(), ServerError> {
    let config = MatchConfig::ai_vs_ai(Difficulty::Medium, Difficulty::Medium).with_seed(seed);

    let mut hashes = Vec::with_capacity(runs as usize);
    for run in 0..runs {
        let mut sim = Simulation::new(&config)?;
        sim.run_until(ticks);
        tracing::info!(run, tick = sim.current_tick(), hash = sim.state_hash(), "run finished");
        hashes.push(sim.state_hash());
    }

    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    print_json(&serde_json::json!({
        "seed": seed,
        "runs": runs,
        "ticks": ticks,
        "deterministic": deterministic,
        "hashes": hashes,
    }));

    if deterministic {
        Ok(())
    } else {
        Err(ServerError::TaskFailed(format!(
            "seed {seed} diverged across {runs} runs"
        )))
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("failed to serialize output: {e}"),
    }
}
