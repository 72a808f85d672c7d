//! Snapshot command implementation

use super::seeded_engine;
use crate::config::Config;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Seed state JSON file
    #[arg(short, long)]
    pub state: PathBuf,
}

impl SnapshotArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let engine = seeded_engine(config, &self.state).await?;
        let snapshot = engine.get_risk_snapshot().await?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    }
}
