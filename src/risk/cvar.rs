//! Conditional Value at Risk
//!
//! Historical CVaR: the mean of the worst `ceil(n * (1 - confidence))`
//! returns. The Risk-On and Investment books are always measured with
//! separate calls; only their ceilings are reconciled downstream.

use crate::error::{EngineError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Smallest sample accepted by default
pub const DEFAULT_MIN_OBSERVATIONS: usize = 20;

/// Tail statistics for one return series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailRisk {
    /// Return at the tail boundary (k-th lowest)
    pub value_at_risk: Decimal,
    /// Mean of the tail, negative for a loss
    pub cvar: Decimal,
    /// Number of observations averaged
    pub tail_size: usize,
    /// Sample size
    pub observations: usize,
}

/// Historical CVaR calculator
#[derive(Debug, Clone)]
pub struct CvarCalculator {
    /// Confidence level, e.g. 0.95
    pub confidence_level: Decimal,
    /// Minimum sample size
    pub min_observations: usize,
}

impl CvarCalculator {
    /// Create a new calculator
    pub fn new(confidence_level: Decimal, min_observations: usize) -> Self {
        Self {
            confidence_level,
            min_observations,
        }
    }

    /// CVaR of `returns` at the configured confidence
    pub fn cvar(&self, returns: &[Decimal]) -> Result<Decimal> {
        self.tail_risk(returns).map(|t| t.cvar)
    }

    /// Full tail statistics for `returns`
    pub fn tail_risk(&self, returns: &[Decimal]) -> Result<TailRisk> {
        if self.confidence_level <= dec!(0) || self.confidence_level >= Decimal::ONE {
            return Err(EngineError::validation(
                "confidence_level",
                format!("must be within (0, 1), got {}", self.confidence_level),
            ));
        }
        if returns.is_empty() || returns.len() < self.min_observations {
            return Err(EngineError::InsufficientData {
                required: self.min_observations.max(1),
                actual: returns.len(),
            });
        }

        let mut sorted = returns.to_vec();
        // Stable sort keeps tie order deterministic
        sorted.sort();

        let n = sorted.len();
        let tail_size = tail_size(n, self.confidence_level);
        let tail = &sorted[..tail_size];
        let sum: Decimal = tail.iter().sum();

        Ok(TailRisk {
            value_at_risk: tail[tail_size - 1],
            cvar: sum / Decimal::from(tail_size),
            tail_size,
            observations: n,
        })
    }
}

impl Default for CvarCalculator {
    fn default() -> Self {
        Self::new(dec!(0.95), DEFAULT_MIN_OBSERVATIONS)
    }
}

/// `ceil(n * (1 - confidence))`, at least one observation and at most `n`
fn tail_size(n: usize, confidence_level: Decimal) -> usize {
    let raw = (Decimal::from(n) * (Decimal::ONE - confidence_level)).ceil();
    raw.to_usize().unwrap_or(n).clamp(1, n)
}

/// Convenience wrapper using the default minimum sample size
pub fn cvar(returns: &[Decimal], confidence_level: Decimal) -> Result<Decimal> {
    CvarCalculator::new(confidence_level, DEFAULT_MIN_OBSERVATIONS).cvar(returns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[i64]) -> Vec<Decimal> {
        // Values are in basis points
        values.iter().map(|v| Decimal::new(*v, 4)).collect()
    }

    #[test]
    fn test_insufficient_data() {
        let calc = CvarCalculator::default();
        let returns = series(&[-100; 19]);
        let err = calc.cvar(&returns).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData {
                required: 20,
                actual: 19
            }
        ));
    }

    #[test]
    fn test_twenty_observations_uses_single_worst() {
        // ceil(20 * 0.05) = 1
        let mut values: Vec<i64> = (1..=19).map(|i| i * 10).collect();
        values.push(-500);
        let returns = series(&values);

        let tail = CvarCalculator::default().tail_risk(&returns).unwrap();
        assert_eq!(tail.tail_size, 1);
        assert_eq!(tail.cvar, dec!(-0.05));
        assert_eq!(tail.value_at_risk, dec!(-0.05));
    }

    #[test]
    fn test_forty_observations_averages_two() {
        // ceil(40 * 0.05) = 2
        let mut values: Vec<i64> = vec![50; 38];
        values.push(-400);
        values.push(-200);
        let returns = series(&values);

        let tail = CvarCalculator::default().tail_risk(&returns).unwrap();
        assert_eq!(tail.tail_size, 2);
        assert_eq!(tail.cvar, dec!(-0.03));
        assert_eq!(tail.value_at_risk, dec!(-0.02));
    }

    #[test]
    fn test_fractional_tail_rounds_up() {
        // ceil(30 * 0.05) = ceil(1.5) = 2
        let mut values: Vec<i64> = vec![10; 28];
        values.push(-300);
        values.push(-100);
        let tail = CvarCalculator::default()
            .tail_risk(&series(&values))
            .unwrap();
        assert_eq!(tail.tail_size, 2);
        assert_eq!(tail.cvar, dec!(-0.02));
    }

    #[test]
    fn test_cvar_bounded_by_min_and_mean() {
        let values: Vec<i64> = (0..100).map(|i| ((i * 37) % 61) - 30).collect();
        let returns = series(&values);

        let min = *returns.iter().min().unwrap();
        let mean: Decimal = returns.iter().sum::<Decimal>() / Decimal::from(returns.len());
        let result = cvar(&returns, dec!(0.95)).unwrap();

        assert!(result >= min);
        assert!(result <= mean);
    }

    #[test]
    fn test_input_order_irrelevant() {
        let values: Vec<i64> = (0..25).map(|i| 100 - i * 9).collect();
        let mut reversed = values.clone();
        reversed.reverse();

        let a = cvar(&series(&values), dec!(0.95)).unwrap();
        let b = cvar(&series(&reversed), dec!(0.95)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_confidence() {
        let calc = CvarCalculator::new(dec!(1), 20);
        let err = calc.cvar(&series(&[0; 20])).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_tail_size_helper() {
        assert_eq!(tail_size(20, dec!(0.95)), 1);
        assert_eq!(tail_size(100, dec!(0.95)), 5);
        assert_eq!(tail_size(101, dec!(0.95)), 6);
        assert_eq!(tail_size(20, dec!(0.99)), 1);
    }
}
