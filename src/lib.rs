//! risk-alloc: Position sizing and risk allocation engine
//!
//! This library provides the core components for:
//! - CVaR measurement over per-book return series
//! - Kelly criterion sizing with outlier-adjusted confidence
//! - Portfolio allocation against a fixed CVaR ceiling
//! - Position lifecycle from Risk-On through Protected to Investment
//! - Candidate evaluation, conviction ranking and daily deployment budget
//! - Versioned record store with optimistic concurrency
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod risk;
pub mod signal;
pub mod store;
pub mod telemetry;
