//! Position and lifecycle types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Execution status of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurrentStatus {
    #[default]
    Active,
    Closed,
    /// Accepted but not yet filled
    Pending,
}

/// Whether the stop still exposes capital
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopStatus {
    /// Stop below entry, capital at risk
    #[default]
    Risk,
    /// Stop at or above breakeven
    Protected,
}

/// Portfolio lifecycle stage, ordered from most to least active risk
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum PortfolioStage {
    #[default]
    RiskOn,
    Protected,
    Investment,
}

impl fmt::Display for CurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for PortfolioStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A position record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Ticker, unique across the store
    pub symbol: String,
    /// Position size in USD
    pub size_usd: Decimal,
    /// Entry timestamp
    pub entry_date: DateTime<Utc>,
    pub current_status: CurrentStatus,
    pub stop_status: StopStatus,
    pub portfolio_stage: PortfolioStage,
    #[serde(default)]
    pub notes: String,
    /// Incremented on every committed write
    #[serde(default)]
    pub version: u64,
    /// Time of the last committed write
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Not closed
    pub fn is_open(&self) -> bool {
        self.current_status != CurrentStatus::Closed
    }
}

/// Input for creating a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPosition {
    pub symbol: String,
    pub size_usd: Decimal,
    pub entry_date: DateTime<Utc>,
    #[serde(default)]
    pub current_status: CurrentStatus,
    #[serde(default)]
    pub stop_status: StopStatus,
    #[serde(default)]
    pub portfolio_stage: PortfolioStage,
    #[serde(default)]
    pub notes: String,
}

impl NewPosition {
    /// Fresh Risk-On entry with the stop still at risk
    pub fn risk_on(symbol: impl Into<String>, size_usd: Decimal, entry_date: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            size_usd,
            entry_date,
            current_status: CurrentStatus::Active,
            stop_status: StopStatus::Risk,
            portfolio_stage: PortfolioStage::RiskOn,
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Manual field edits; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionPatch {
    pub size_usd: Option<Decimal>,
    pub entry_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub current_status: Option<CurrentStatus>,
    pub stop_status: Option<StopStatus>,
    /// When set, the write fails unless the stored version matches
    pub expected_version: Option<u64>,
}

impl PositionPatch {
    pub fn is_empty(&self) -> bool {
        self.size_usd.is_none()
            && self.entry_date.is_none()
            && self.notes.is_none()
            && self.current_status.is_none()
            && self.stop_status.is_none()
    }
}

/// Append-only audit entry for a stage change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: Uuid,
    pub symbol: String,
    pub from_stage: PortfolioStage,
    pub to_stage: PortfolioStage,
    pub timestamp: DateTime<Utc>,
}
