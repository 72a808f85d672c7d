//! Risk allocation against the fixed CVaR ceiling
//!
//! Combines account balances and per-book CVaR into one `RiskSnapshot`.
//! Pure recomputation: the same accounts and return series always produce
//! the same snapshot (apart from the timestamp).

use super::cvar::CvarCalculator;
use super::limits::{RiskThresholdAlert, RiskThresholds};
use super::types::{
    Account, Book, RiskAllocation, RiskBucket, RiskSnapshot, SubPortfolioRisk,
};
use crate::config::RiskConfig;
use crate::error::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Return series for both books, kept apart so they can never be merged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookReturns {
    #[serde(default)]
    pub risk_on: Vec<Decimal>,
    #[serde(default)]
    pub investment: Vec<Decimal>,
}

impl BookReturns {
    pub fn get(&self, book: Book) -> &[Decimal] {
        match book {
            Book::RiskOn => &self.risk_on,
            Book::Investment => &self.investment,
        }
    }

    pub fn set(&mut self, book: Book, returns: Vec<Decimal>) {
        match book {
            Book::RiskOn => self.risk_on = returns,
            Book::Investment => self.investment = returns,
        }
    }
}

/// Sum of all account balances
pub fn net_worth(accounts: &[Account]) -> Decimal {
    accounts.iter().map(|a| a.balance).sum()
}

/// Sum of balances funding `book`
pub fn book_net_worth(accounts: &[Account], book: Book) -> Decimal {
    accounts
        .iter()
        .filter(|a| a.book == book)
        .map(|a| a.balance)
        .sum()
}

/// Dollar amount for each configured tier
pub fn risk_buckets(net_worth: Decimal, tiers: &[Decimal], target_cvar: Decimal) -> Vec<RiskBucket> {
    tiers
        .iter()
        .map(|pct| RiskBucket {
            percentage: *pct,
            amount_usd: net_worth * pct,
            active: *pct == target_cvar,
        })
        .collect()
}

/// Split of the combined risk amount between the two books
///
/// Falls back to net-worth proportions when neither book carries risk,
/// and to an even split when there is no net worth either, so the two
/// shares always sum to one.
pub fn risk_shares(
    trading_risk_usd: Decimal,
    investment_risk_usd: Decimal,
    trading_net_worth: Decimal,
    investment_net_worth: Decimal,
) -> (Decimal, Decimal) {
    let total_risk = trading_risk_usd + investment_risk_usd;
    let trading = if total_risk > dec!(0) {
        trading_risk_usd / total_risk
    } else {
        let total_worth = trading_net_worth + investment_net_worth;
        if total_worth > dec!(0) {
            trading_net_worth / total_worth
        } else {
            dec!(0.5)
        }
    };
    (trading, Decimal::ONE - trading)
}

/// Computes risk snapshots from account and return-series state
#[derive(Debug, Clone)]
pub struct RiskAllocationManager {
    target_cvar: Decimal,
    calculator: CvarCalculator,
    thresholds: RiskThresholds,
    bucket_tiers: Vec<Decimal>,
}

impl RiskAllocationManager {
    /// Create a new allocation manager
    pub fn new(
        target_cvar: Decimal,
        calculator: CvarCalculator,
        thresholds: RiskThresholds,
        bucket_tiers: Vec<Decimal>,
    ) -> Self {
        Self {
            target_cvar,
            calculator,
            thresholds,
            bucket_tiers,
        }
    }

    /// Create from RiskConfig
    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(
            config.target_cvar,
            CvarCalculator::new(config.confidence_level, config.min_observations),
            config.thresholds.clone(),
            config.buckets.clone(),
        )
    }

    pub fn target_cvar(&self) -> Decimal {
        self.target_cvar
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Risk figures for one book; share is filled in by `reconcile`
    pub fn sub_portfolio(
        &self,
        book: Book,
        accounts: &[Account],
        returns: &[Decimal],
    ) -> Result<SubPortfolioRisk> {
        let net_worth = book_net_worth(accounts, book);
        let cvar95 = self.calculator.cvar(returns)?;
        Ok(SubPortfolioRisk {
            book,
            net_worth,
            cvar95,
            risk_amount_usd: net_worth * cvar95.abs(),
            risk_share: dec!(0),
        })
    }

    /// Reconcile both books into a single allocation
    pub fn reconcile(
        &self,
        net_worth: Decimal,
        mut trading: SubPortfolioRisk,
        mut investment: SubPortfolioRisk,
    ) -> (RiskAllocation, SubPortfolioRisk, SubPortfolioRisk) {
        let (trading_share, investment_share) = risk_shares(
            trading.risk_amount_usd,
            investment.risk_amount_usd,
            trading.net_worth,
            investment.net_worth,
        );
        trading.risk_share = trading_share;
        investment.risk_share = investment_share;

        let current_cvar =
            trading_share * trading.cvar95.abs() + investment_share * investment.cvar95.abs();

        let allocation = RiskAllocation {
            net_worth,
            target_cvar: self.target_cvar,
            current_cvar,
            utilization: if self.target_cvar > dec!(0) {
                current_cvar / self.target_cvar
            } else {
                dec!(0)
            },
            available_risk: self.target_cvar - current_cvar,
            risk_amount_usd: net_worth * self.target_cvar,
        };

        (allocation, trading, investment)
    }

    /// Multiplier the Investment book alone would need to reach the ceiling
    pub fn investment_leverage_target(&self, investment_cvar95: Decimal) -> Option<Decimal> {
        if investment_cvar95 == dec!(0) {
            return None;
        }
        Some(-self.target_cvar / investment_cvar95)
    }

    /// Full recomputation from accounts and both return series
    pub fn compute(&self, accounts: &[Account], returns: &BookReturns) -> Result<RiskSnapshot> {
        let total = net_worth(accounts);
        let trading = self.sub_portfolio(Book::RiskOn, accounts, &returns.risk_on)?;
        let investment = self.sub_portfolio(Book::Investment, accounts, &returns.investment)?;

        let investment_leverage_target = self.investment_leverage_target(investment.cvar95);
        let (allocation, trading, investment) = self.reconcile(total, trading, investment);
        let alert = RiskThresholdAlert::check(&self.thresholds, allocation.utilization);

        tracing::debug!(
            net_worth = %allocation.net_worth,
            current_cvar = %allocation.current_cvar,
            utilization = %allocation.utilization,
            trading_share = %trading.risk_share,
            "Risk allocation recomputed"
        );

        Ok(RiskSnapshot {
            buckets: risk_buckets(total, &self.bucket_tiers, self.target_cvar),
            allocation,
            trading,
            investment,
            investment_leverage_target,
            alert,
            computed_at: Utc::now(),
        })
    }
}

impl Default for RiskAllocationManager {
    fn default() -> Self {
        Self::from_config(&RiskConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::AlertLevel;

    fn account(name: &str, balance: Decimal, book: Book) -> Account {
        Account::new(name, balance, book)
    }

    /// 20 observations whose single worst value is `worst`
    fn returns_with_worst(worst: Decimal) -> Vec<Decimal> {
        let mut r = vec![dec!(0.01); 19];
        r.push(worst);
        r
    }

    #[test]
    fn test_net_worth_and_risk_amount() {
        let accounts = vec![
            account("A", dec!(10000), Book::RiskOn),
            account("B", dec!(5000), Book::RiskOn),
            account("C", dec!(2000), Book::Investment),
        ];
        let total = net_worth(&accounts);
        assert_eq!(total, dec!(17000));

        let manager = RiskAllocationManager::default();
        let returns = BookReturns {
            risk_on: returns_with_worst(dec!(-0.05)),
            investment: returns_with_worst(dec!(-0.10)),
        };
        let snapshot = manager.compute(&accounts, &returns).unwrap();
        assert_eq!(snapshot.allocation.risk_amount_usd, dec!(2006));
        assert_eq!(snapshot.trading.net_worth, dec!(15000));
        assert_eq!(snapshot.investment.net_worth, dec!(2000));
    }

    #[test]
    fn test_reconcile_shares_sum_to_one() {
        let accounts = vec![
            account("T", dec!(30000), Book::RiskOn),
            account("I", dec!(70000), Book::Investment),
        ];
        let returns = BookReturns {
            risk_on: returns_with_worst(dec!(-0.07)),
            investment: returns_with_worst(dec!(-0.03)),
        };
        let snapshot = RiskAllocationManager::default()
            .compute(&accounts, &returns)
            .unwrap();

        // trading risk = 2100, investment risk = 2100
        assert_eq!(snapshot.trading.risk_amount_usd, dec!(2100));
        assert_eq!(snapshot.investment.risk_amount_usd, dec!(2100));
        assert_eq!(snapshot.trading.risk_share, dec!(0.5));
        assert_eq!(
            snapshot.trading.risk_share + snapshot.investment.risk_share,
            dec!(1)
        );
        // 0.5 * 0.07 + 0.5 * 0.03
        assert_eq!(snapshot.allocation.current_cvar, dec!(0.05));
        assert_eq!(snapshot.allocation.available_risk, dec!(0.068));
    }

    #[test]
    fn test_shares_sum_to_one_for_uneven_split() {
        let (t, i) = risk_shares(dec!(1), dec!(2), dec!(0), dec!(0));
        assert_eq!(t + i, dec!(1));
        assert!(t < i);
    }

    #[test]
    fn test_zero_risk_falls_back_to_net_worth() {
        assert_eq!(
            risk_shares(dec!(0), dec!(0), dec!(300), dec!(100)),
            (dec!(0.75), dec!(0.25))
        );
        assert_eq!(
            risk_shares(dec!(0), dec!(0), dec!(0), dec!(0)),
            (dec!(0.5), dec!(0.5))
        );
    }

    #[test]
    fn test_investment_leverage_target() {
        let manager = RiskAllocationManager::default();
        // -0.118 / -0.059 = 2
        assert_eq!(
            manager.investment_leverage_target(dec!(-0.059)),
            Some(dec!(2))
        );
        assert_eq!(manager.investment_leverage_target(dec!(0)), None);
    }

    #[test]
    fn test_alert_raised_above_warning() {
        let accounts = vec![account("T", dec!(10000), Book::RiskOn)];
        let returns = BookReturns {
            risk_on: returns_with_worst(dec!(-0.12)),
            investment: returns_with_worst(dec!(-0.01)),
        };
        let snapshot = RiskAllocationManager::default()
            .compute(&accounts, &returns)
            .unwrap();

        // Investment book has no net worth, so trading carries all risk
        assert_eq!(snapshot.trading.risk_share, dec!(1));
        assert_eq!(snapshot.allocation.current_cvar, dec!(0.12));
        let alert = snapshot.alert.expect("utilization above 1.0");
        assert_eq!(alert.level, AlertLevel::Critical);
        assert!(snapshot.allocation.available_risk < dec!(0));
    }

    #[test]
    fn test_missing_returns_is_an_error() {
        let accounts = vec![account("T", dec!(10000), Book::RiskOn)];
        let returns = BookReturns {
            risk_on: returns_with_worst(dec!(-0.05)),
            investment: vec![],
        };
        let result = RiskAllocationManager::default().compute(&accounts, &returns);
        assert!(matches!(
            result,
            Err(crate::error::EngineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_buckets_mark_target_active() {
        let tiers = vec![dec!(0.03), dec!(0.05), dec!(0.08), dec!(0.118), dec!(0.13)];
        let buckets = risk_buckets(dec!(17000), &tiers, dec!(0.118));

        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[0].amount_usd, dec!(510));
        let active: Vec<_> = buckets.iter().filter(|b| b.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].amount_usd, dec!(2006));
    }

    #[test]
    fn test_book_returns_kept_apart() {
        let mut returns = BookReturns::default();
        returns.set(Book::RiskOn, vec![dec!(0.01)]);
        returns.set(Book::Investment, vec![dec!(0.02), dec!(0.03)]);
        assert_eq!(returns.get(Book::RiskOn).len(), 1);
        assert_eq!(returns.get(Book::Investment).len(), 2);
    }
}
