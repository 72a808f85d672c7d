//! Risk engine
//!
//! Ties the calculators to a record store. Mutations are serialized per
//! resource and committed with a version check; reads share a cached risk
//! snapshot that every write invalidates.

mod cycle;

pub use cycle::{CandidateSource, CycleReport, EvaluationCycle, RejectedCandidate, StaticCandidates};

use crate::config::Config;
use crate::error::{EngineError, Result, ValidationErrors};
use crate::lifecycle::{
    NewPosition, PortfolioStage, Position, PositionLifecycleManager, PositionPatch,
    TransitionRecord, MAX_NOTES_LEN,
};
use crate::risk::{
    net_worth, Account, Book, BookReturns, DrawdownMonitor, KellyCalculator, KellyEstimate,
    KellyInput, KellySource, RiskAllocationManager, RiskSnapshot, RiskThresholdAlert, TradeStats,
};
use crate::signal::{
    admit, Candidate, DeploymentBudget, DeploymentLedger, EvaluationContext, Signal,
    SignalEvaluator,
};
use crate::store::{RecordStore, StoreView};
use crate::telemetry::{record_latency, set_gauge, GaugeMetric, LatencyMetric};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};

/// Longest accepted account name
pub const MAX_ACCOUNT_NAME_LEN: usize = 64;

#[derive(Debug)]
struct CachedSnapshot {
    /// Write generation it was computed at
    generation: u64,
    /// Account versions it was computed from
    accounts: Vec<(String, u64)>,
    snapshot: RiskSnapshot,
}

#[derive(Debug, Default)]
struct SnapshotCache {
    entry: Option<CachedSnapshot>,
    /// Alert carried by the most recent recomputation
    last_alert: Option<RiskThresholdAlert>,
}

fn account_versions(accounts: &[Account]) -> Vec<(String, u64)> {
    let mut versions: Vec<_> = accounts
        .iter()
        .map(|a| (a.name.clone(), a.version))
        .collect();
    versions.sort();
    versions
}

fn decimal_gauge(metric: GaugeMetric, value: Decimal) {
    set_gauge(metric, value.to_f64().unwrap_or_default());
}

/// Position sizing and risk allocation engine over a record store
pub struct RiskEngine<S: RecordStore> {
    config: Config,
    store: Arc<S>,
    allocation: RiskAllocationManager,
    kelly: KellyCalculator,
    lifecycle: PositionLifecycleManager,
    evaluator: SignalEvaluator,
    returns: RwLock<BookReturns>,
    drawdown: RwLock<DrawdownMonitor>,
    ledger: Mutex<DeploymentLedger>,
    cache: RwLock<SnapshotCache>,
    generation: AtomicU64,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    alerts: broadcast::Sender<RiskThresholdAlert>,
}

impl<S: RecordStore> RiskEngine<S> {
    /// Create an engine over `store`
    pub fn new(config: Config, store: Arc<S>) -> Self {
        let (alerts, _) = broadcast::channel(16);
        Self {
            allocation: RiskAllocationManager::from_config(&config.risk),
            kelly: KellyCalculator::from_config(&config.kelly),
            lifecycle: PositionLifecycleManager::new(),
            evaluator: SignalEvaluator::from_config(&config.pipeline),
            returns: RwLock::new(BookReturns::default()),
            drawdown: RwLock::new(DrawdownMonitor::default()),
            ledger: Mutex::new(DeploymentLedger::new()),
            cache: RwLock::new(SnapshotCache::default()),
            generation: AtomicU64::new(0),
            locks: Mutex::new(HashMap::new()),
            alerts,
            config,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Receive every alert that is more severe than the one before it
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<RiskThresholdAlert> {
        self.alerts.subscribe()
    }

    /// Run a store call under the upstream timeout
    async fn store_call<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout_ms = self.config.engine.upstream_timeout_ms;
        let started = Instant::now();
        let result = tokio::time::timeout(self.config.engine.upstream_timeout(), call)
            .await
            .map_err(|_| {
                tracing::warn!(operation, timeout_ms, "Store call timed out");
                EngineError::UpstreamTimeout {
                    operation,
                    timeout_ms,
                }
            })?;
        record_latency(LatencyMetric::StoreCall, started.elapsed());
        result
    }

    /// Serialize writers of one record
    ///
    /// Entries nobody holds or waits on are dropped, so keys for records that
    /// turned out not to exist do not accumulate.
    async fn lock_resource(&self, key: String) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        lock.lock_owned().await
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Recompute after a committed write so alerts fire without a reader
    async fn refresh(&self) {
        if let Err(e) = self.get_risk_snapshot().await {
            tracing::debug!(error = %e, "Risk snapshot not refreshed");
        }
    }

    async fn cached_snapshot(&self, generation: u64) -> Option<RiskSnapshot> {
        let cache = self.cache.read().await;
        cache
            .entry
            .as_ref()
            .filter(|cached| cached.generation == generation)
            .map(|cached| cached.snapshot.clone())
    }

    /// Cached snapshot, only if it was computed from the accounts in `view`
    async fn cached_snapshot_for(&self, generation: u64, view: &StoreView) -> Option<RiskSnapshot> {
        let cache = self.cache.read().await;
        cache
            .entry
            .as_ref()
            .filter(|cached| {
                cached.generation == generation
                    && cached.accounts == account_versions(&view.accounts)
            })
            .map(|cached| cached.snapshot.clone())
    }

    async fn recompute(&self, generation: u64, view: &StoreView) -> Result<RiskSnapshot> {
        let started = Instant::now();
        let snapshot = {
            let returns = self.returns.read().await;
            self.allocation.compute(&view.accounts, &returns)?
        };
        let allocation = &snapshot.allocation;

        self.drawdown.write().await.update(allocation.net_worth);

        decimal_gauge(GaugeMetric::NetWorth, allocation.net_worth);
        decimal_gauge(GaugeMetric::CurrentCvar, allocation.current_cvar);
        decimal_gauge(GaugeMetric::Utilization, allocation.utilization);
        decimal_gauge(GaugeMetric::AvailableRisk, allocation.available_risk);
        set_gauge(
            GaugeMetric::OpenPositions,
            view.positions.iter().filter(|p| p.is_open()).count() as f64,
        );

        let mut cache = self.cache.write().await;
        if let Some(alert) = &snapshot.alert {
            if alert.escalates(cache.last_alert.as_ref()) {
                tracing::warn!(
                    level = ?alert.level,
                    utilization = %alert.utilization,
                    "Risk threshold crossed"
                );
                // No subscribers is fine
                let _ = self.alerts.send(alert.clone());
            }
        }
        cache.last_alert = snapshot.alert.clone();
        // A write landed while computing: serve this result but don't keep it
        if self.generation.load(Ordering::Acquire) == generation {
            cache.entry = Some(CachedSnapshot {
                generation,
                accounts: account_versions(&view.accounts),
                snapshot: snapshot.clone(),
            });
        }

        record_latency(LatencyMetric::SnapshotCompute, started.elapsed());
        Ok(snapshot)
    }

    /// Snapshot plus the store view it is consistent with
    async fn load_state(&self) -> Result<(RiskSnapshot, StoreView)> {
        let generation = self.generation.load(Ordering::Acquire);
        let view = self.store_call("load_view", self.store.load_view()).await?;

        // A write may have landed while the view was loading
        let unchanged = self.generation.load(Ordering::Acquire) == generation;
        let cached = if unchanged {
            self.cached_snapshot_for(generation, &view).await
        } else {
            None
        };
        let snapshot = match cached {
            Some(snapshot) => snapshot,
            None => self.recompute(generation, &view).await?,
        };
        Ok((snapshot, view))
    }

    fn require_kelly(view: &StoreView) -> Result<KellyInput> {
        view.kelly_input
            .clone()
            .ok_or_else(|| EngineError::NotFound {
                kind: "kelly input",
                key: "current".to_string(),
            })
    }

    async fn require_position(&self, symbol: &str) -> Result<Position> {
        self.store_call("get_position", self.store.get_position(symbol))
            .await?
            .ok_or_else(|| EngineError::NotFound {
                kind: "position",
                key: symbol.to_string(),
            })
    }

    /// Current allocation, both books, buckets, and any threshold alert
    pub async fn get_risk_snapshot(&self) -> Result<RiskSnapshot> {
        let generation = self.generation.load(Ordering::Acquire);
        if let Some(snapshot) = self.cached_snapshot(generation).await {
            return Ok(snapshot);
        }
        let view = self.store_call("load_view", self.store.load_view()).await?;
        self.recompute(generation, &view).await
    }

    /// Replace the return series of one book
    pub async fn update_book_returns(&self, book: Book, returns: Vec<Decimal>) {
        let observations = returns.len();
        self.returns.write().await.set(book, returns);
        tracing::info!(%book, observations, "Book returns updated");
        self.invalidate();
        self.refresh().await;
    }

    /// Set the balance of an account, creating it in the Risk-On book if new
    pub async fn update_account_balance(&self, name: &str, balance: Decimal) -> Result<Account> {
        self.write_account(name, balance, None).await
    }

    /// Set the balance and book of an account
    pub async fn upsert_account(&self, name: &str, balance: Decimal, book: Book) -> Result<Account> {
        self.write_account(name, balance, Some(book)).await
    }

    async fn write_account(
        &self,
        name: &str,
        balance: Decimal,
        book: Option<Book>,
    ) -> Result<Account> {
        let mut errors = ValidationErrors::new();
        if name.trim().is_empty() {
            errors.push("name", "must not be empty");
        } else if name.chars().count() > MAX_ACCOUNT_NAME_LEN {
            errors.push("name", format!("must be at most {MAX_ACCOUNT_NAME_LEN} characters"));
        }
        if balance < dec!(0) {
            errors.push("balance", format!("must not be negative, got {balance}"));
        }
        errors.into_result()?;

        let _guard = self.lock_resource(format!("account:{name}")).await;
        let current = self
            .store_call("get_account", self.store.get_account(name))
            .await?;
        let expected = current.as_ref().map_or(0, |a| a.version);
        let book = book
            .or_else(|| current.as_ref().map(|a| a.book))
            .unwrap_or_default();

        let account = Account {
            name: name.to_string(),
            balance,
            book,
            last_updated: Utc::now(),
            version: expected + 1,
        };
        self.store_call("save_account", self.store.save_account(account.clone(), expected))
            .await?;

        tracing::info!(
            account = %account.name,
            balance = %account.balance,
            book = %account.book,
            version = account.version,
            "Account balance updated"
        );
        self.invalidate();
        self.refresh().await;
        Ok(account)
    }

    /// Replace the Kelly fraction used for sizing
    pub async fn update_kelly_input(
        &self,
        fraction: Decimal,
        source: KellySource,
        notes: impl Into<String>,
    ) -> Result<KellyInput> {
        let notes = notes.into();
        let mut errors = ValidationErrors::new();
        if fraction < dec!(0) || fraction > Decimal::ONE {
            errors.push("kelly_fraction", format!("must be within [0, 1], got {fraction}"));
        }
        if notes.chars().count() > MAX_NOTES_LEN {
            errors.push("notes", format!("must be at most {MAX_NOTES_LEN} characters"));
        }
        errors.into_result()?;

        let _guard = self.lock_resource("kelly".to_string()).await;
        let current = self
            .store_call("get_kelly_input", self.store.get_kelly_input())
            .await?;
        let expected = current.as_ref().map_or(0, |k| k.version);

        let input = KellyInput {
            kelly_fraction: fraction,
            source,
            last_updated: Utc::now(),
            notes,
            version: expected + 1,
        };
        self.store_call(
            "save_kelly_input",
            self.store.save_kelly_input(input.clone(), expected),
        )
        .await?;

        tracing::info!(
            kelly_fraction = %input.kelly_fraction,
            source = ?input.source,
            version = input.version,
            "Kelly input updated"
        );
        Ok(input)
    }

    /// Derive a new Kelly fraction from the trade journal and store it
    pub async fn recalculate_kelly(
        &self,
        trades: &TradeStats,
        outliers_excluded: usize,
    ) -> Result<KellyEstimate> {
        let view = self.store_call("load_view", self.store.load_view()).await?;
        let estimate = self
            .kelly
            .calculate(trades, outliers_excluded, net_worth(&view.accounts))?;

        let notes = format!(
            "{} primary trades, {} outliers excluded",
            estimate.primary_count, estimate.outliers_excluded
        );
        self.update_kelly_input(estimate.fraction, KellySource::Calculated, notes)
            .await?;
        Ok(estimate)
    }

    /// Record a new position
    pub async fn add_position(&self, record: NewPosition) -> Result<Position> {
        let position = self.lifecycle.create(record, Utc::now())?;

        let _guard = self.lock_resource(position_key(&position.symbol)).await;
        self.store_call("insert_position", self.store.insert_position(position.clone()))
            .await?;

        tracing::info!(
            symbol = %position.symbol,
            size_usd = %position.size_usd,
            stage = %position.portfolio_stage,
            "Position added"
        );
        self.invalidate();
        self.refresh().await;
        Ok(position)
    }

    /// Edit fields of an existing position
    pub async fn update_position(&self, symbol: &str, patch: PositionPatch) -> Result<Position> {
        let _guard = self.lock_resource(position_key(symbol)).await;
        let current = self.require_position(symbol).await?;

        if let Some(expected) = patch.expected_version {
            if expected != current.version {
                return Err(EngineError::ConcurrentModification {
                    resource: format!("position {symbol}"),
                    expected,
                    actual: current.version,
                });
            }
        }

        let next = self.lifecycle.apply_patch(&current, &patch, Utc::now())?;
        self.store_call(
            "save_position",
            self.store.save_position(next.clone(), current.version),
        )
        .await?;

        tracing::info!(
            symbol = %next.symbol,
            status = %next.current_status,
            stop = %next.stop_status,
            version = next.version,
            "Position updated"
        );
        self.invalidate();
        self.refresh().await;
        Ok(next)
    }

    /// Move a position to the next portfolio stage
    pub async fn transition_position(
        &self,
        symbol: &str,
        target: PortfolioStage,
    ) -> Result<Position> {
        let _guard = self.lock_resource(position_key(symbol)).await;
        let current = self.require_position(symbol).await?;

        let (next, record) = match self.lifecycle.transition(&current, target, Utc::now()) {
            Ok(moved) => moved,
            Err(e) => {
                tracing::warn!(symbol, from = %current.portfolio_stage, to = %target, "Transition refused");
                return Err(e);
            }
        };
        self.store_call(
            "commit_transition",
            self.store
                .commit_transition(next.clone(), current.version, record),
        )
        .await?;

        tracing::info!(
            symbol,
            from = %current.portfolio_stage,
            to = %next.portfolio_stage,
            "Position transitioned"
        );
        self.invalidate();
        self.refresh().await;
        Ok(next)
    }

    pub async fn positions(&self) -> Result<Vec<Position>> {
        self.store_call("list_positions", self.store.list_positions())
            .await
    }

    pub async fn transition_log(&self) -> Result<Vec<TransitionRecord>> {
        self.store_call("transition_log", self.store.transition_log())
            .await
    }

    /// Size one candidate against current state. Nothing is stored.
    pub async fn evaluate_signal(&self, candidate: &Candidate) -> Result<Signal> {
        let (snapshot, view) = self.load_state().await?;
        let kelly = Self::require_kelly(&view)?;
        let context =
            EvaluationContext::new(self.config.pipeline.default_open_slots, view.open_symbols());
        self.evaluator
            .evaluate(candidate, &kelly, &snapshot.allocation, &context)
    }

    /// Size, rank and admit a batch of candidates against today's budget
    ///
    /// Invalid candidates, and candidates for a symbol that already has a
    /// position record, are reported and skipped; the rest are still ranked.
    pub async fn evaluate_cycle(&self, candidates: &[Candidate]) -> Result<CycleReport> {
        let started = Instant::now();
        let (snapshot, view) = self.load_state().await?;
        let kelly = Self::require_kelly(&view)?;
        let context =
            EvaluationContext::new(self.config.pipeline.default_open_slots, view.open_symbols());

        // Position records are keyed by symbol, so these could never be accepted
        let recorded: HashSet<&str> = view.positions.iter().map(|p| p.symbol.as_str()).collect();
        let mut seen = HashSet::new();

        let mut signals = Vec::with_capacity(candidates.len());
        let mut rejected = Vec::new();
        for candidate in candidates {
            let symbol = candidate.symbol.as_str();
            let conflict = if recorded.contains(symbol) {
                Some("position already recorded for symbol")
            } else if !seen.insert(symbol) {
                Some("duplicate candidate in batch")
            } else {
                None
            };
            if let Some(reason) = conflict {
                tracing::debug!(symbol, reason, "Candidate rejected");
                rejected.push(RejectedCandidate {
                    symbol: candidate.symbol.clone(),
                    reason: reason.to_string(),
                });
                continue;
            }

            match self
                .evaluator
                .evaluate(candidate, &kelly, &snapshot.allocation, &context)
            {
                Ok(signal) => signals.push(signal),
                Err(e) => {
                    tracing::warn!(symbol = %candidate.symbol, error = %e, "Candidate rejected");
                    rejected.push(RejectedCandidate {
                        symbol: candidate.symbol.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let drawdown = self.drawdown.read().await.current_drawdown();
        let budget = DeploymentBudget::compute(
            &self.config.pipeline,
            snapshot.allocation.net_worth,
            drawdown,
            snapshot.allocation.utilization,
        );
        let today = Utc::now().date_naive();
        let (deployed_today, remaining_budget_usd) = {
            let ledger = self.ledger.lock().await;
            (ledger.committed(today), ledger.remaining(&budget, today))
        };
        let (ranked, committed_usd) = admit(signals, remaining_budget_usd);
        decimal_gauge(GaugeMetric::DeploymentBudget, remaining_budget_usd);

        let report = CycleReport {
            allocation: snapshot.allocation,
            budget,
            drawdown,
            deployed_today,
            remaining_budget_usd,
            committed_usd,
            signals: ranked,
            rejected,
            evaluated_at: Utc::now(),
        };

        tracing::info!(
            evaluated = candidates.len(),
            admitted = report.admitted().count(),
            deferred = report.signals.len() - report.admitted().count(),
            rejected = report.rejected.len(),
            remaining_budget = %report.remaining_budget_usd,
            "Evaluation cycle complete"
        );
        record_latency(LatencyMetric::EvaluationCycle, started.elapsed());
        Ok(report)
    }

    /// Open a Risk-On position for a signal and charge it to today's budget
    pub async fn accept_signal(&self, signal: &Signal) -> Result<Position> {
        let record = NewPosition::risk_on(
            signal.symbol.clone(),
            signal.proposed_position_usd,
            Utc::now(),
        )
        .with_notes(format!("Accepted signal {}", signal.id));
        let position = self.add_position(record).await?;

        self.ledger
            .lock()
            .await
            .record(Utc::now().date_naive(), signal.proposed_position_usd);
        Ok(position)
    }
}

fn position_key(symbol: &str) -> String {
    format!("position:{symbol}")
}
