//! Risk management module
//!
//! CVaR measurement, Kelly sizing, and allocation against the portfolio ceiling

mod allocation;
mod cvar;
mod kelly;
mod limits;
mod types;

pub use allocation::{
    book_net_worth, net_worth, risk_buckets, risk_shares, BookReturns, RiskAllocationManager,
};
pub use cvar::{cvar, CvarCalculator, TailRisk, DEFAULT_MIN_OBSERVATIONS};
pub use kelly::{KellyCalculator, KellyEstimate, TradeStats, DEFAULT_MIN_PRIMARY_TRADES};
pub use limits::{AlertLevel, DrawdownMonitor, RiskThresholdAlert, RiskThresholds};
pub use types::{
    Account, Book, KellyInput, KellySource, RiskAllocation, RiskBucket, RiskSnapshot,
    SubPortfolioRisk,
};
