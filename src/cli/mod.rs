//! CLI interface for risk-alloc
//!
//! Provides subcommands for:
//! - `snapshot`: Print the risk snapshot for a seed state
//! - `evaluate`: Rank a candidates file against a seed state
//! - `run`: Evaluate candidates on an interval until Ctrl-C
//! - `config`: Print the effective configuration

mod evaluate;
mod run;
mod seed;
mod snapshot;

pub use evaluate::EvaluateArgs;
pub use run::RunArgs;
pub use seed::{load_candidates, SeedAccount, SeedJournal, SeedKelly, SeedState};
pub use snapshot::SnapshotArgs;

use crate::config::Config;
use crate::engine::RiskEngine;
use crate::store::MemoryStore;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "risk-alloc")]
#[command(about = "Position sizing and CVaR risk allocation engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the risk snapshot
    Snapshot(SnapshotArgs),
    /// Evaluate a batch of candidates once
    Evaluate(EvaluateArgs),
    /// Run the evaluation cycle until interrupted
    Run(RunArgs),
    /// Show configuration
    Config,
}

/// Engine over an in-memory store, seeded from `state`
async fn seeded_engine(
    config: &Config,
    state: &Path,
) -> anyhow::Result<RiskEngine<MemoryStore>> {
    let engine = RiskEngine::new(config.clone(), Arc::new(MemoryStore::new()));
    SeedState::load(state)?.apply(&engine).await?;
    Ok(engine)
}
