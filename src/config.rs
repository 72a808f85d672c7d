//! Configuration types for risk-alloc

use crate::risk::{RiskThresholds, DEFAULT_MIN_OBSERVATIONS, DEFAULT_MIN_PRIMARY_TRADES};
use crate::telemetry::LogFormat;
use anyhow::{bail, Context};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub risk: RiskConfig,
    /// Required: the per-trade constant has no meaningful default
    pub kelly: KellyConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Portfolio ceiling and CVaR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fixed CVaR ceiling as a fraction of net worth
    #[serde(default = "default_target_cvar")]
    pub target_cvar: Decimal,

    /// CVaR confidence level
    #[serde(default = "default_confidence_level")]
    pub confidence_level: Decimal,

    /// Minimum return observations per book
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,

    /// Utilization alert thresholds
    #[serde(default)]
    pub thresholds: RiskThresholds,

    /// Informational bucket tiers; the one equal to target_cvar is active
    #[serde(default = "default_buckets")]
    pub buckets: Vec<Decimal>,
}

fn default_target_cvar() -> Decimal {
    Decimal::new(118, 3) // 0.118 = 11.8%
}
fn default_confidence_level() -> Decimal {
    Decimal::new(95, 2) // 0.95
}
fn default_min_observations() -> usize {
    DEFAULT_MIN_OBSERVATIONS
}
fn default_buckets() -> Vec<Decimal> {
    vec![
        Decimal::new(3, 2),
        Decimal::new(5, 2),
        Decimal::new(8, 2),
        Decimal::new(118, 3),
        Decimal::new(13, 2),
    ]
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            target_cvar: default_target_cvar(),
            confidence_level: default_confidence_level(),
            min_observations: DEFAULT_MIN_OBSERVATIONS,
            thresholds: RiskThresholds::default(),
            buckets: default_buckets(),
        }
    }
}

/// Kelly engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KellyConfig {
    /// Converts a Kelly fraction into a per-position dollar ceiling
    pub risk_per_trade_constant: Decimal,

    /// Minimum non-outlier trades
    #[serde(default = "default_min_primary_trades")]
    pub min_primary_trades: usize,
}

fn default_min_primary_trades() -> usize {
    DEFAULT_MIN_PRIMARY_TRADES
}

impl KellyConfig {
    pub fn new(risk_per_trade_constant: Decimal) -> Self {
        Self {
            risk_per_trade_constant,
            min_primary_trades: DEFAULT_MIN_PRIMARY_TRADES,
        }
    }
}

/// Conviction score weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvictionWeights {
    pub strategy_score: Decimal,
    pub signal_quality: Decimal,
    pub expected_return: Decimal,
    pub regime: Decimal,
}

impl Default for ConvictionWeights {
    fn default() -> Self {
        Self {
            strategy_score: Decimal::new(4, 1),
            signal_quality: Decimal::new(3, 1),
            expected_return: Decimal::new(2, 1),
            regime: Decimal::new(1, 1),
        }
    }
}

/// Signal evaluation pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Daily deployment budget as a fraction of net worth
    pub base_rate: Decimal,
    /// Drawdown above which the budget is reduced
    pub drawdown_threshold: Decimal,
    pub drawdown_multiplier: Decimal,
    /// Utilization above which the budget is reduced
    pub utilization_threshold: Decimal,
    pub utilization_multiplier: Decimal,
    pub weights: ConvictionWeights,
    /// Cap applied to the expected-return boost
    pub expected_return_cap: Decimal,
    /// Penalty per unit of average correlation to open positions
    pub correlation_penalty: Decimal,
    /// Candidate slots when a cycle does not say otherwise
    pub default_open_slots: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_rate: Decimal::new(5, 2),             // 5% of net worth per day
            drawdown_threshold: Decimal::new(10, 2),   // 10%
            drawdown_multiplier: Decimal::new(5, 1),   // halve
            utilization_threshold: Decimal::new(8, 1), // 80%
            utilization_multiplier: Decimal::new(5, 1),
            weights: ConvictionWeights::default(),
            expected_return_cap: Decimal::new(2, 0),
            correlation_penalty: Decimal::new(2, 1),
            default_open_slots: 5,
        }
    }
}

/// Engine orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between evaluation cycles
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,

    /// Timeout for any store call
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,
}

fn default_cycle_interval_secs() -> u64 {
    30
}
fn default_upstream_timeout_ms() -> u64 {
    2000
}

impl EngineConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval_secs(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port; disabled when absent
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Load `path`, or parse `fallback` only when the file does not exist
    ///
    /// A file that exists but fails to parse or validate is an error.
    pub fn load_or(path: impl AsRef<std::path::Path>, fallback: &str) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        Self::parse(fallback).context("bundled example configuration is invalid")
    }

    /// Parse and validate TOML configuration
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.engine.cycle_interval_secs == 0 {
            bail!("engine.cycle_interval_secs must be at least 1");
        }
        if self.engine.upstream_timeout_ms == 0 {
            bail!("engine.upstream_timeout_ms must be at least 1");
        }
        Ok(())
    }

    /// Defaults everywhere except the required Kelly constant
    pub fn with_kelly(kelly: KellyConfig) -> Self {
        Self {
            risk: RiskConfig::default(),
            kelly,
            pipeline: PipelineConfig::default(),
            engine: EngineConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}
