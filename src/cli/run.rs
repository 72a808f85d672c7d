//! Run command implementation

use super::{load_candidates, seeded_engine};
use crate::config::Config;
use crate::engine::{EvaluationCycle, StaticCandidates};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Seed state JSON file
    #[arg(short, long)]
    pub state: PathBuf,

    /// Candidates JSON file, offered on every cycle
    #[arg(long)]
    pub candidates: PathBuf,

    /// Override the configured cycle interval in seconds
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let engine = Arc::new(seeded_engine(config, &self.state).await?);
        let source = Arc::new(StaticCandidates::new(load_candidates(&self.candidates)?));

        let mut cycle = EvaluationCycle::new(Arc::clone(&engine), source);
        if let Some(secs) = self.interval {
            cycle = cycle.with_interval(Duration::from_secs(secs));
        }

        let mut alerts = engine.subscribe_alerts();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, mut reports) = cycle.spawn(shutdown_rx);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupt received, shutting down");
                    break;
                }
                Ok(alert) = alerts.recv() => {
                    tracing::warn!(level = ?alert.level, utilization = %alert.utilization, "Risk alert");
                }
                report = reports.recv() => match report {
                    Some(report) => {
                        for ranked in &report.signals {
                            println!(
                                "#{:<3} {:<8} conviction={} proposed={} {:?}",
                                ranked.rank,
                                ranked.signal.symbol,
                                ranked.signal.conviction.round_dp(4),
                                ranked.signal.proposed_position_usd,
                                ranked.admission,
                            );
                        }
                    }
                    None => break,
                }
            }
        }

        // Receiver may already be gone if the loop ended on its own
        let _ = shutdown_tx.send(true);
        handle.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_zero_interval_rejected() {
        let parsed = Cli::try_parse_from([
            "risk-alloc", "run", "-s", "seed.json", "--candidates", "c.json", "--interval", "0",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_interval_override_parses() {
        let cli = Cli::try_parse_from([
            "risk-alloc", "run", "-s", "seed.json", "--candidates", "c.json", "--interval", "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => assert_eq!(args.interval, Some(5)),
            other => panic!("expected run, got {other:?}"),
        }
    }
}
