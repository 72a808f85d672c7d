//! Utilization thresholds and drawdown tracking

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Utilization levels at which an advisory alert is raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Utilization for a Warning alert
    pub warning: Decimal,
    /// Utilization for a Critical alert
    pub critical: Decimal,
    /// Utilization for an Excessive alert
    pub excessive: Decimal,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            warning: dec!(0.8),
            critical: dec!(1.0),
            excessive: dec!(1.2),
        }
    }
}

impl RiskThresholds {
    /// Highest level reached by `utilization`, if any
    pub fn classify(&self, utilization: Decimal) -> Option<AlertLevel> {
        if utilization >= self.excessive {
            Some(AlertLevel::Excessive)
        } else if utilization >= self.critical {
            Some(AlertLevel::Critical)
        } else if utilization >= self.warning {
            Some(AlertLevel::Warning)
        } else {
            None
        }
    }
}

/// Severity of a utilization alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertLevel {
    Warning,
    Critical,
    Excessive,
}

/// Advisory raised when utilization crosses a threshold. Never blocks writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholdAlert {
    pub level: AlertLevel,
    pub utilization: Decimal,
}

impl RiskThresholdAlert {
    /// Build an alert if `utilization` reaches any threshold
    pub fn check(thresholds: &RiskThresholds, utilization: Decimal) -> Option<Self> {
        thresholds
            .classify(utilization)
            .map(|level| Self { level, utilization })
    }

    /// True if this alert is more severe than `previous`
    pub fn escalates(&self, previous: Option<&RiskThresholdAlert>) -> bool {
        match previous {
            Some(prev) => self.level > prev.level,
            None => true,
        }
    }
}

/// Tracks peak and current net worth to derive drawdown
#[derive(Debug, Clone)]
pub struct DrawdownMonitor {
    /// Peak net worth value
    pub peak_equity: Decimal,
    /// Current net worth value
    pub current_equity: Decimal,
}

impl DrawdownMonitor {
    /// Create a new drawdown monitor
    pub fn new(initial_equity: Decimal) -> Self {
        Self {
            peak_equity: initial_equity,
            current_equity: initial_equity,
        }
    }

    /// Update with new net worth value
    pub fn update(&mut self, new_equity: Decimal) {
        self.current_equity = new_equity;
        if new_equity > self.peak_equity {
            self.peak_equity = new_equity;
        }
    }

    /// Get current drawdown from peak
    pub fn current_drawdown(&self) -> Decimal {
        if self.peak_equity <= dec!(0) {
            return dec!(0);
        }
        ((self.peak_equity - self.current_equity) / self.peak_equity).max(dec!(0))
    }
}

impl Default for DrawdownMonitor {
    fn default() -> Self {
        Self::new(dec!(0))
    }
}
