//! Conviction scoring
//!
//! Ranks candidates only; it never feeds into position size.

use super::types::Candidate;
use crate::config::{ConvictionWeights, PipelineConfig};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Components of a conviction score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvictionBreakdown {
    pub strategy: Decimal,
    pub quality: Decimal,
    pub expected_return: Decimal,
    pub regime: Decimal,
    /// Average correlation to open positions
    pub avg_correlation: Decimal,
    pub correlation_penalty: Decimal,
    pub total: Decimal,
}

/// Weighted conviction score calculator
#[derive(Debug, Clone)]
pub struct ConvictionScorer {
    pub weights: ConvictionWeights,
    pub expected_return_cap: Decimal,
    pub correlation_penalty: Decimal,
}

impl ConvictionScorer {
    pub fn new(
        weights: ConvictionWeights,
        expected_return_cap: Decimal,
        correlation_penalty: Decimal,
    ) -> Self {
        Self {
            weights,
            expected_return_cap,
            correlation_penalty,
        }
    }

    /// Create from PipelineConfig
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.weights.clone(),
            config.expected_return_cap,
            config.correlation_penalty,
        )
    }

    /// Mean correlation between the candidate and the open positions
    ///
    /// Symbols the candidate reports no correlation for count as zero.
    pub fn average_correlation(candidate: &Candidate, open_symbols: &[String]) -> Decimal {
        let others: Vec<&String> = open_symbols
            .iter()
            .filter(|s| **s != candidate.symbol)
            .collect();
        if others.is_empty() {
            return dec!(0);
        }
        let sum: Decimal = others
            .iter()
            .map(|s| candidate.correlations.get(*s).copied().unwrap_or(dec!(0)))
            .sum();
        sum / Decimal::from(others.len())
    }

    /// Score one candidate against the current open positions
    pub fn score(&self, candidate: &Candidate, open_symbols: &[String]) -> ConvictionBreakdown {
        let strategy = self.weights.strategy_score * candidate.strategy_score;
        let quality = self.weights.signal_quality * candidate.signal_quality;
        let boost = candidate
            .expected_return_boost
            .max(dec!(0))
            .min(self.expected_return_cap);
        let expected_return = self.weights.expected_return * boost;
        let regime = if candidate.regime_aligned {
            self.weights.regime
        } else {
            dec!(0)
        };

        let avg_correlation = Self::average_correlation(candidate, open_symbols);
        // Diversifying (negative) correlation is not rewarded
        let correlation_penalty = self.correlation_penalty * avg_correlation.max(dec!(0));

        ConvictionBreakdown {
            strategy,
            quality,
            expected_return,
            regime,
            avg_correlation,
            correlation_penalty,
            total: strategy + quality + expected_return + regime - correlation_penalty,
        }
    }
}

impl Default for ConvictionScorer {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}
