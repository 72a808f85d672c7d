//! Signal types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A trade idea submitted for sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    /// Live price per unit
    pub price: Decimal,
    /// Historical drawdown risk in [0, 1]
    pub pct_drawdown_risk: Decimal,
    /// Size chosen by the external sizing decision
    pub proposed_position_usd: Decimal,
    /// Strategy Performance Score from the backtesting subsystem
    pub strategy_score: Decimal,
    /// Signal Quality Score from the real-time filter
    pub signal_quality: Decimal,
    /// Expected-return boost before capping
    #[serde(default)]
    pub expected_return_boost: Decimal,
    /// Whether the trade agrees with the current market regime
    #[serde(default)]
    pub regime_aligned: bool,
    /// Correlation to other symbols in [-1, 1]
    #[serde(default)]
    pub correlations: HashMap<String, Decimal>,
}

impl Candidate {
    /// Minimal candidate with neutral scores
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        pct_drawdown_risk: Decimal,
        proposed_position_usd: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            pct_drawdown_risk,
            proposed_position_usd,
            strategy_score: dec!(0),
            signal_quality: dec!(0),
            expected_return_boost: dec!(0),
            regime_aligned: false,
            correlations: HashMap::new(),
        }
    }

    pub fn with_scores(mut self, strategy_score: Decimal, signal_quality: Decimal) -> Self {
        self.strategy_score = strategy_score;
        self.signal_quality = signal_quality;
        self
    }

    pub fn with_expected_return(mut self, boost: Decimal) -> Self {
        self.expected_return_boost = boost;
        self
    }

    pub fn with_regime_aligned(mut self, aligned: bool) -> Self {
        self.regime_aligned = aligned;
        self
    }

    pub fn with_correlation(mut self, symbol: impl Into<String>, correlation: Decimal) -> Self {
        self.correlations.insert(symbol.into(), correlation);
        self
    }
}

/// A sized candidate. Recomputed every cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Unique signal identifier
    pub id: Uuid,
    pub symbol: String,
    pub price: Decimal,
    pub pct_drawdown_risk: Decimal,
    /// Net worth * Kelly fraction * (1 - drawdown risk)
    pub kelly_position_usd: Decimal,
    /// Remaining ceiling apportioned to this slot
    pub max_allocation_pct: Decimal,
    pub max_allocation_usd: Decimal,
    pub proposed_position_usd: Decimal,
    /// Whole units affordable at `price`
    pub allocated_units: Decimal,
    /// proposed / kelly position; may exceed 1.0
    pub kelly_efficiency: Option<Decimal>,
    /// proposed / max allocation; may exceed 1.0
    pub allocation_efficiency: Option<Decimal>,
    /// Ranking score
    pub conviction: Decimal,
    /// Signal generation timestamp
    pub evaluated_at: DateTime<Utc>,
}

impl Signal {
    /// Proposed size is above either advisory reference
    pub fn is_oversized(&self) -> bool {
        self.kelly_efficiency.is_some_and(|e| e > Decimal::ONE)
            || self.allocation_efficiency.is_some_and(|e| e > Decimal::ONE)
    }
}

/// Outcome of budget admission for one signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Admission {
    /// Fits in today's deployment budget
    Admitted,
    /// Waits for a later cycle
    Deferred,
}

/// A signal with its rank and admission decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSignal {
    /// 1-based rank by conviction
    pub rank: usize,
    pub signal: Signal,
    pub admission: Admission,
}
