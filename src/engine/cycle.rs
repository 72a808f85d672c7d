//! Periodic evaluation cycle
//!
//! Pulls candidates from a source on a fixed interval, runs them through the
//! engine, and forwards each report on a channel. A shutdown signal that
//! arrives mid-cycle drops that cycle's report.

use super::RiskEngine;
use crate::risk::RiskAllocation;
use crate::signal::{Admission, Candidate, DeploymentBudget, RankedSignal};
use crate::store::RecordStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shortest period the loop will tick at
const MIN_CYCLE_INTERVAL: Duration = Duration::from_millis(1);

/// Candidate that failed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    pub symbol: String,
    pub reason: String,
}

/// Outcome of one evaluation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Allocation the candidates were sized against
    pub allocation: RiskAllocation,
    pub budget: DeploymentBudget,
    /// Drawdown from peak net worth at evaluation time
    pub drawdown: Decimal,
    /// Capital already committed today through accepted signals
    pub deployed_today: Decimal,
    /// Budget left for this cycle
    pub remaining_budget_usd: Decimal,
    /// Sum of admitted proposals
    pub committed_usd: Decimal,
    /// Valid candidates in conviction order
    pub signals: Vec<RankedSignal>,
    pub rejected: Vec<RejectedCandidate>,
    pub evaluated_at: DateTime<Utc>,
}

impl CycleReport {
    pub fn admitted(&self) -> impl Iterator<Item = &RankedSignal> {
        self.signals
            .iter()
            .filter(|s| s.admission == Admission::Admitted)
    }

    pub fn deferred(&self) -> impl Iterator<Item = &RankedSignal> {
        self.signals
            .iter()
            .filter(|s| s.admission == Admission::Deferred)
    }
}

/// Trait for candidate feeds
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Candidates for the next cycle
    async fn candidates(&self) -> anyhow::Result<Vec<Candidate>>;
}

/// Fixed list of candidates, offered again on every cycle
#[derive(Debug, Clone, Default)]
pub struct StaticCandidates {
    candidates: Vec<Candidate>,
}

impl StaticCandidates {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl CandidateSource for StaticCandidates {
    async fn candidates(&self) -> anyhow::Result<Vec<Candidate>> {
        Ok(self.candidates.clone())
    }
}

/// Runs `evaluate_cycle` on an interval
pub struct EvaluationCycle<S: RecordStore, C: CandidateSource> {
    engine: Arc<RiskEngine<S>>,
    source: Arc<C>,
    interval: Duration,
}

impl<S: RecordStore + 'static, C: CandidateSource + 'static> EvaluationCycle<S, C> {
    /// Create a cycle using the engine's configured interval
    pub fn new(engine: Arc<RiskEngine<S>>, source: Arc<C>) -> Self {
        let interval = engine.config().engine.cycle_interval();
        Self {
            engine,
            source,
            interval,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Fetch candidates and evaluate them once
    pub async fn run_once(&self) -> anyhow::Result<CycleReport> {
        let candidates = self.source.candidates().await?;
        let report = self.engine.evaluate_cycle(&candidates).await?;
        Ok(report)
    }

    /// Spawn the cycle loop; it stops when `shutdown` changes or is dropped
    pub fn spawn(
        self,
        mut shutdown: watch::Receiver<bool>,
    ) -> (JoinHandle<()>, mpsc::Receiver<CycleReport>) {
        let (report_tx, report_rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval.max(MIN_CYCLE_INTERVAL));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        tracing::info!("Evaluation cycle stopped");
                        return;
                    }

                    _ = interval.tick() => {
                        let report = tokio::select! {
                            _ = shutdown.changed() => {
                                tracing::info!("Evaluation cycle cancelled, report discarded");
                                return;
                            }
                            result = self.run_once() => match result {
                                Ok(report) => report,
                                Err(e) => {
                                    tracing::warn!(error = %e, "Evaluation cycle failed");
                                    continue;
                                }
                            }
                        };

                        // A full channel must not hold off shutdown
                        tokio::select! {
                            _ = shutdown.changed() => {
                                tracing::info!("Evaluation cycle stopped");
                                return;
                            }
                            sent = report_tx.send(report) => {
                                if sent.is_err() {
                                    tracing::warn!("Report receiver dropped");
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        });

        (handle, report_rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, KellyConfig};
    use crate::risk::{Book, KellySource};
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn returns() -> Vec<Decimal> {
        let mut r = vec![dec!(0.01); 19];
        r.push(dec!(-0.04));
        r
    }

    async fn engine(store: MemoryStore) -> Arc<RiskEngine<MemoryStore>> {
        let engine = RiskEngine::new(
            Config::with_kelly(KellyConfig::new(dec!(0.02))),
            Arc::new(store),
        );
        engine.update_book_returns(Book::RiskOn, returns()).await;
        engine.update_book_returns(Book::Investment, returns()).await;
        engine.update_account_balance("MAIN", dec!(50000)).await.unwrap();
        engine
            .update_kelly_input(dec!(0.2), KellySource::Manual, "")
            .await
            .unwrap();
        Arc::new(engine)
    }

    fn source() -> Arc<StaticCandidates> {
        Arc::new(StaticCandidates::new(vec![Candidate::new(
            "SPY",
            dec!(500),
            dec!(0.1),
            dec!(1000),
        )]))
    }

    #[tokio::test]
    async fn test_run_once() {
        let cycle = EvaluationCycle::new(engine(MemoryStore::new()).await, source());
        let report = cycle.run_once().await.unwrap();
        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.admitted().count(), 1);
        assert_eq!(report.deferred().count(), 0);
    }

    #[tokio::test]
    async fn test_spawned_cycle_reports_until_shutdown() {
        let cycle = EvaluationCycle::new(engine(MemoryStore::new()).await, source())
            .with_interval(Duration::from_millis(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, mut reports) = cycle.spawn(shutdown_rx);

        let first = reports.recv().await.unwrap();
        assert_eq!(first.signals[0].signal.symbol, "SPY");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_still_ticks() {
        let cycle = EvaluationCycle::new(engine(MemoryStore::new()).await, source())
            .with_interval(Duration::ZERO);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, mut reports) = cycle.spawn(shutdown_rx);

        assert!(reports.recv().await.is_some());

        // Stop reading until the channel is full; shutdown still lands
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    struct SlowCandidates;

    #[async_trait]
    impl CandidateSource for SlowCandidates {
        async fn candidates(&self) -> anyhow::Result<Vec<Candidate>> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(vec![Candidate::new("QQQ", dec!(400), dec!(0.1), dec!(800))])
        }
    }

    #[tokio::test]
    async fn test_cancelled_cycle_discards_report() {
        let cycle = EvaluationCycle::new(engine(MemoryStore::new()).await, Arc::new(SlowCandidates));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, mut reports) = cycle.spawn(shutdown_rx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(reports.recv().await.is_none());
    }
}
