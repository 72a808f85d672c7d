//! Evaluate command implementation

use super::{load_candidates, seeded_engine};
use crate::config::Config;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Seed state JSON file
    #[arg(short, long)]
    pub state: PathBuf,

    /// Candidates JSON file
    #[arg(long)]
    pub candidates: PathBuf,
}

impl EvaluateArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let engine = seeded_engine(config, &self.state).await?;
        let candidates = load_candidates(&self.candidates)?;
        let report = engine.evaluate_cycle(&candidates).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
