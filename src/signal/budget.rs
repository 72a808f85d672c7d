//! Daily deployment budget and admission
//!
//! Bounds total new capital per day. Candidates are taken in conviction
//! order; once one no longer fits, it and everything ranked below it is
//! deferred to a later cycle.

use super::types::{Admission, RankedSignal, Signal};
use crate::config::PipelineConfig;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Capital available for new positions in the current day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentBudget {
    /// net_worth * base_rate
    pub base_usd: Decimal,
    /// Drawdown multiplier was applied
    pub drawdown_reduced: bool,
    /// Utilization multiplier was applied
    pub utilization_reduced: bool,
    /// Budget after reductions
    pub total_usd: Decimal,
}

impl DeploymentBudget {
    /// Derive the budget from net worth and current stress levels
    pub fn compute(
        config: &PipelineConfig,
        net_worth: Decimal,
        drawdown: Decimal,
        utilization: Decimal,
    ) -> Self {
        let base_usd = (net_worth * config.base_rate).max(dec!(0));
        let mut total_usd = base_usd;

        let drawdown_reduced = drawdown > config.drawdown_threshold;
        if drawdown_reduced {
            total_usd *= config.drawdown_multiplier;
        }
        let utilization_reduced = utilization > config.utilization_threshold;
        if utilization_reduced {
            total_usd *= config.utilization_multiplier;
        }

        Self {
            base_usd,
            drawdown_reduced,
            utilization_reduced,
            total_usd,
        }
    }
}

/// Capital committed through accepted signals, reset at each UTC day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentLedger {
    day: Option<NaiveDate>,
    committed_usd: Decimal,
}

impl DeploymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount committed on `today`
    pub fn committed(&self, today: NaiveDate) -> Decimal {
        if self.day == Some(today) {
            self.committed_usd
        } else {
            dec!(0)
        }
    }

    pub fn record(&mut self, today: NaiveDate, amount_usd: Decimal) {
        if self.day != Some(today) {
            self.day = Some(today);
            self.committed_usd = dec!(0);
        }
        self.committed_usd += amount_usd;
    }

    /// What is left of `budget` on `today`, never negative
    pub fn remaining(&self, budget: &DeploymentBudget, today: NaiveDate) -> Decimal {
        (budget.total_usd - self.committed(today)).max(dec!(0))
    }
}

/// Highest conviction first; ties broken by symbol for a stable order
fn by_conviction(a: &Signal, b: &Signal) -> Ordering {
    b.conviction
        .cmp(&a.conviction)
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// Rank signals and admit them against `budget_usd`
///
/// Returns the ranked signals and the amount committed to admitted ones.
pub fn admit(mut signals: Vec<Signal>, budget_usd: Decimal) -> (Vec<RankedSignal>, Decimal) {
    signals.sort_by(by_conviction);

    let mut remaining = budget_usd;
    let mut exhausted = false;
    let mut committed = dec!(0);

    let ranked = signals
        .into_iter()
        .enumerate()
        .map(|(i, signal)| {
            let fits = !exhausted && signal.proposed_position_usd <= remaining;
            let admission = if fits {
                remaining -= signal.proposed_position_usd;
                committed += signal.proposed_position_usd;
                Admission::Admitted
            } else {
                exhausted = true;
                Admission::Deferred
            };
            RankedSignal {
                rank: i + 1,
                signal,
                admission,
            }
        })
        .collect();

    (ranked, committed)
}
