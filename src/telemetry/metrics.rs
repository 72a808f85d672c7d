//! Prometheus metrics

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Risk snapshot recomputation
    SnapshotCompute,
    /// One full evaluation cycle
    EvaluationCycle,
    /// Round trip to the record store
    StoreCall,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Sum of all account balances
    NetWorth,
    /// Blended CVaR magnitude
    CurrentCvar,
    /// current_cvar / target_cvar
    Utilization,
    /// target_cvar - current_cvar
    AvailableRisk,
    /// Positions not closed
    OpenPositions,
    /// Remaining daily deployment budget
    DeploymentBudget,
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::SnapshotCompute => "riskalloc_snapshot_compute_ms",
            LatencyMetric::EvaluationCycle => "riskalloc_evaluation_cycle_ms",
            LatencyMetric::StoreCall => "riskalloc_store_call_ms",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::NetWorth => "riskalloc_net_worth_usd",
            GaugeMetric::CurrentCvar => "riskalloc_current_cvar",
            GaugeMetric::Utilization => "riskalloc_utilization",
            GaugeMetric::AvailableRisk => "riskalloc_available_risk",
            GaugeMetric::OpenPositions => "riskalloc_open_positions",
            GaugeMetric::DeploymentBudget => "riskalloc_deployment_budget_usd",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let value_ms = duration.as_secs_f64() * 1000.0;
    ::metrics::histogram!(metric.name()).record(value_ms);
    tracing::trace!(metric = metric.name(), value_ms, "Recording latency");
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    ::metrics::gauge!(metric.name()).set(value);
    tracing::trace!(metric = metric.name(), value, "Setting gauge");
}

/// Start the Prometheus scrape endpoint on `port`
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
