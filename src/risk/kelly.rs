//! Kelly criterion position sizing
//!
//! Classical Kelly from win rate and payoff ratio, discounted by the share
//! of trades that survived outlier exclusion:
//! - `f = p - (1 - p) / (avg_win / |avg_loss|)`, clipped to [0, 1]
//! - `confidence = 1 - outliers / (primary + outliers)`
//! - `max_risk_usd = f * confidence * net_worth * risk_per_trade_constant`

use super::types::{KellyInput, KellySource};
use crate::config::KellyConfig;
use crate::error::{EngineError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Smallest number of non-outlier trades accepted by default
pub const DEFAULT_MIN_PRIMARY_TRADES: usize = 30;

/// Per-trade returns split by outcome, outliers already removed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    /// Returns of winning trades (positive)
    pub wins: Vec<Decimal>,
    /// Returns of losing trades (sign ignored)
    pub losses: Vec<Decimal>,
}

impl TradeStats {
    pub fn new(wins: Vec<Decimal>, losses: Vec<Decimal>) -> Self {
        Self { wins, losses }
    }

    /// Split a journal of trade returns; breakeven trades count as losses
    pub fn from_returns(returns: &[Decimal]) -> Self {
        let (wins, losses): (Vec<Decimal>, Vec<Decimal>) =
            returns.iter().copied().partition(|r| *r > dec!(0));
        Self { wins, losses }
    }

    /// Number of non-outlier trades
    pub fn primary_count(&self) -> usize {
        self.wins.len() + self.losses.len()
    }

    pub fn win_rate(&self) -> Decimal {
        let total = self.primary_count();
        if total == 0 {
            return dec!(0);
        }
        Decimal::from(self.wins.len()) / Decimal::from(total)
    }

    pub fn avg_win(&self) -> Decimal {
        mean_abs(&self.wins)
    }

    /// Average loss magnitude
    pub fn avg_loss(&self) -> Decimal {
        mean_abs(&self.losses)
    }
}

fn mean_abs(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return dec!(0);
    }
    let sum: Decimal = values.iter().map(|v| v.abs()).sum();
    sum / Decimal::from(values.len())
}

/// Result of a Kelly calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KellyEstimate {
    /// Clipped Kelly fraction in [0, 1]
    pub fraction: Decimal,
    /// Kelly fraction before clipping
    pub raw_fraction: Decimal,
    /// Share of trades that were not excluded as outliers
    pub confidence: Decimal,
    /// Dollar ceiling for a single position
    pub max_risk_usd: Decimal,
    pub win_rate: Decimal,
    /// avg_win / avg_loss, absent when there were no losses
    pub payoff_ratio: Option<Decimal>,
    pub primary_count: usize,
    pub outliers_excluded: usize,
}

impl KellyEstimate {
    /// Current-value record for the Risk-On book
    pub fn to_kelly_input(&self, notes: impl Into<String>) -> KellyInput {
        KellyInput {
            kelly_fraction: self.fraction,
            source: KellySource::Calculated,
            last_updated: Utc::now(),
            notes: notes.into(),
            version: 0,
        }
    }
}

/// Kelly criterion calculator for trade journals
#[derive(Debug, Clone)]
pub struct KellyCalculator {
    /// Converts a fraction into a per-position dollar ceiling. Calibrated
    /// empirically, so it is always supplied by configuration.
    pub risk_per_trade_constant: Decimal,
    /// Minimum non-outlier trades for a usable confidence
    pub min_primary_trades: usize,
}

impl KellyCalculator {
    /// Create a new Kelly calculator
    pub fn new(risk_per_trade_constant: Decimal, min_primary_trades: usize) -> Self {
        Self {
            risk_per_trade_constant,
            min_primary_trades,
        }
    }

    /// Create from KellyConfig
    pub fn from_config(config: &KellyConfig) -> Self {
        Self::new(config.risk_per_trade_constant, config.min_primary_trades)
    }

    /// Confidence discount for excluded outliers
    pub fn confidence(primary_count: usize, outliers_excluded: usize) -> Decimal {
        let total = primary_count + outliers_excluded;
        if total == 0 {
            return dec!(0);
        }
        Decimal::ONE - Decimal::from(outliers_excluded) / Decimal::from(total)
    }

    /// Unclipped Kelly fraction
    ///
    /// With no losing magnitude the payoff ratio is unbounded and the
    /// fraction reduces to the win rate; with no winning magnitude it is zero.
    pub fn raw_fraction(win_rate: Decimal, avg_win: Decimal, avg_loss: Decimal) -> Decimal {
        if avg_win <= dec!(0) {
            return dec!(0);
        }
        if avg_loss <= dec!(0) {
            return win_rate;
        }
        let payoff = avg_win / avg_loss;
        win_rate - (Decimal::ONE - win_rate) / payoff
    }

    /// Kelly fraction clipped to [0, 1]
    pub fn fraction(win_rate: Decimal, avg_win: Decimal, avg_loss: Decimal) -> Decimal {
        Self::raw_fraction(win_rate, avg_win, avg_loss)
            .max(dec!(0))
            .min(Decimal::ONE)
    }

    /// Calculate the Kelly fraction, confidence and per-position ceiling
    pub fn calculate(
        &self,
        trades: &TradeStats,
        outliers_excluded: usize,
        net_worth: Decimal,
    ) -> Result<KellyEstimate> {
        let primary_count = trades.primary_count();
        if primary_count < self.min_primary_trades {
            return Err(EngineError::InsufficientTrades {
                required: self.min_primary_trades,
                actual: primary_count,
            });
        }

        let win_rate = trades.win_rate();
        let avg_win = trades.avg_win();
        let avg_loss = trades.avg_loss();

        let raw_fraction = Self::raw_fraction(win_rate, avg_win, avg_loss);
        let fraction = raw_fraction.max(dec!(0)).min(Decimal::ONE);
        let confidence = Self::confidence(primary_count, outliers_excluded);
        let max_risk_usd = fraction * confidence * net_worth * self.risk_per_trade_constant;

        tracing::debug!(
            primary_count,
            outliers_excluded,
            %win_rate,
            %raw_fraction,
            %fraction,
            %confidence,
            %max_risk_usd,
            "Kelly estimate computed"
        );

        Ok(KellyEstimate {
            fraction,
            raw_fraction,
            confidence,
            max_risk_usd,
            win_rate,
            payoff_ratio: (avg_loss > dec!(0)).then(|| avg_win / avg_loss),
            primary_count,
            outliers_excluded,
        })
    }
}
