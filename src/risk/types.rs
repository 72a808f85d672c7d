//! Risk management types

use super::RiskThresholdAlert;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sub-portfolio an account or return series belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Book {
    /// Actively traded positions
    #[default]
    RiskOn,
    /// Long-horizon holdings
    Investment,
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Book::RiskOn => f.write_str("RiskOn"),
            Book::Investment => f.write_str("Investment"),
        }
    }
}

/// A funding account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account name
    pub name: String,
    /// Current balance in USD
    pub balance: Decimal,
    /// Book funded by this account
    #[serde(default)]
    pub book: Book,
    /// Time of the last balance update
    pub last_updated: DateTime<Utc>,
    /// Incremented on every committed write; 0 before the first commit
    #[serde(default)]
    pub version: u64,
}

impl Account {
    pub fn new(name: impl Into<String>, balance: Decimal, book: Book) -> Self {
        Self {
            name: name.into(),
            balance,
            book,
            last_updated: Utc::now(),
            version: 0,
        }
    }
}

/// Where the current Kelly fraction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KellySource {
    /// Derived from the trade journal
    Journal,
    /// Entered by hand
    Manual,
    /// Computed by the Kelly engine
    Calculated,
}

/// Current Kelly fraction for the Risk-On book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KellyInput {
    /// Fraction in [0, 1]
    pub kelly_fraction: Decimal,
    pub source: KellySource,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    /// Incremented on every committed write; 0 before the first commit
    #[serde(default)]
    pub version: u64,
}

/// Risk figures for one book, computed independently of the other
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPortfolioRisk {
    pub book: Book,
    /// Sum of balances funding this book
    pub net_worth: Decimal,
    /// CVaR at the configured confidence (negative for a loss)
    pub cvar95: Decimal,
    /// net_worth * |cvar95|
    pub risk_amount_usd: Decimal,
    /// Share of the combined risk amount carried by this book
    pub risk_share: Decimal,
}

/// Portfolio-wide allocation against the fixed CVaR ceiling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAllocation {
    pub net_worth: Decimal,
    pub target_cvar: Decimal,
    /// Blended loss magnitude, always >= 0
    pub current_cvar: Decimal,
    pub utilization: Decimal,
    /// Negative once the ceiling is breached
    pub available_risk: Decimal,
    pub risk_amount_usd: Decimal,
}

/// Percentage-of-net-worth tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBucket {
    pub percentage: Decimal,
    pub amount_usd: Decimal,
    /// True for the tier matching the target CVaR
    pub active: bool,
}

/// Everything the allocation manager derives in one recomputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub allocation: RiskAllocation,
    pub trading: SubPortfolioRisk,
    pub investment: SubPortfolioRisk,
    /// Multiplier the Investment book alone would need to reach the ceiling
    pub investment_leverage_target: Option<Decimal>,
    pub buckets: Vec<RiskBucket>,
    pub alert: Option<RiskThresholdAlert>,
    pub computed_at: DateTime<Utc>,
}

impl RiskSnapshot {
    /// The bucket matching the target CVaR, if configured
    pub fn active_bucket(&self) -> Option<&RiskBucket> {
        self.buckets.iter().find(|b| b.active)
    }
}
