//! Candidate sizing against the current Kelly input and risk ceiling
//!
//! The proposed size comes from outside and is reported, not capped:
//! efficiencies above 1.0 flag oversized candidates for review.

use super::conviction::ConvictionScorer;
use super::types::{Candidate, Signal};
use crate::config::PipelineConfig;
use crate::error::{Result, ValidationErrors};
use crate::lifecycle::check_symbol;
use crate::risk::{KellyInput, RiskAllocation};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Portfolio context for one evaluation
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// Candidate slots the remaining risk is spread across
    pub open_slots: usize,
    /// Symbols of positions that are not closed
    pub open_symbols: Vec<String>,
}

impl EvaluationContext {
    pub fn new(open_slots: usize, open_symbols: Vec<String>) -> Self {
        Self {
            open_slots,
            open_symbols,
        }
    }
}

/// Check the externally supplied fields of a candidate
pub fn validate_candidate(candidate: &Candidate) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    check_symbol(&candidate.symbol, &mut errors);
    if candidate.price <= dec!(0) {
        errors.push("price", format!("must be greater than zero, got {}", candidate.price));
    }
    if candidate.pct_drawdown_risk < dec!(0) || candidate.pct_drawdown_risk > Decimal::ONE {
        errors.push(
            "pct_drawdown_risk",
            format!("must be within [0, 1], got {}", candidate.pct_drawdown_risk),
        );
    }
    if candidate.proposed_position_usd < dec!(0) {
        errors.push(
            "proposed_position_usd",
            format!("must not be negative, got {}", candidate.proposed_position_usd),
        );
    }
    for (symbol, corr) in &candidate.correlations {
        if *corr < dec!(-1) || *corr > Decimal::ONE {
            errors.push(
                "correlations",
                format!("correlation to {symbol} must be within [-1, 1], got {corr}"),
            );
        }
    }
    errors
}

/// `numerator / denominator`, or `None` for a zero denominator
fn ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    (denominator > dec!(0)).then(|| numerator / denominator)
}

/// Sizes and scores candidates
#[derive(Debug, Clone, Default)]
pub struct SignalEvaluator {
    scorer: ConvictionScorer,
}

impl SignalEvaluator {
    pub fn new(scorer: ConvictionScorer) -> Self {
        Self { scorer }
    }

    /// Create from PipelineConfig
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(ConvictionScorer::from_config(config))
    }

    pub fn scorer(&self) -> &ConvictionScorer {
        &self.scorer
    }

    /// Size one candidate. Pure: nothing is stored.
    pub fn evaluate(
        &self,
        candidate: &Candidate,
        kelly: &KellyInput,
        allocation: &RiskAllocation,
        context: &EvaluationContext,
    ) -> Result<Signal> {
        validate_candidate(candidate).into_result()?;

        let net_worth = allocation.net_worth;
        let slots = Decimal::from(context.open_slots.max(1));

        let kelly_position_usd =
            net_worth * kelly.kelly_fraction * (Decimal::ONE - candidate.pct_drawdown_risk);
        let max_allocation_pct = allocation.available_risk.max(dec!(0)) / slots;
        let max_allocation_usd = net_worth * max_allocation_pct;
        let proposed = candidate.proposed_position_usd;

        let signal = Signal {
            id: Uuid::new_v4(),
            symbol: candidate.symbol.clone(),
            price: candidate.price,
            pct_drawdown_risk: candidate.pct_drawdown_risk,
            kelly_position_usd,
            max_allocation_pct,
            max_allocation_usd,
            proposed_position_usd: proposed,
            allocated_units: (proposed / candidate.price).floor(),
            kelly_efficiency: ratio(proposed, kelly_position_usd),
            allocation_efficiency: ratio(proposed, max_allocation_usd),
            conviction: self.scorer.score(candidate, &context.open_symbols).total,
            evaluated_at: Utc::now(),
        };

        if signal.is_oversized() {
            tracing::debug!(
                symbol = %signal.symbol,
                kelly_efficiency = ?signal.kelly_efficiency,
                allocation_efficiency = ?signal.allocation_efficiency,
                "Proposed size exceeds advisory reference"
            );
        }

        Ok(signal)
    }
}
