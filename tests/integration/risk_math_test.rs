//! Property checks for the CVaR, Kelly and allocation math

use risk_alloc::risk::{
    cvar, risk_shares, CvarCalculator, KellyCalculator, TradeStats,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Deterministic returns in roughly [-0.10, 0.10]
fn returns(seed: u64, n: usize) -> Vec<Decimal> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let bucket = ((state >> 33) % 2001) as i64 - 1000;
            Decimal::new(bucket, 4)
        })
        .collect()
}

#[test]
fn test_cvar_between_min_and_mean() {
    for seed in 1..50 {
        let series = returns(seed, 20 + seed as usize * 3);
        let min = series.iter().copied().min().unwrap();
        let mean: Decimal = series.iter().sum::<Decimal>() / Decimal::from(series.len());

        let value = cvar(&series, dec!(0.95)).unwrap();
        assert!(value >= min, "seed {seed}: {value} below minimum {min}");
        assert!(value <= mean, "seed {seed}: {value} above mean {mean}");
    }
}

#[test]
fn test_cvar_independent_of_order() {
    let series = returns(7, 100);
    let mut reversed = series.clone();
    reversed.reverse();
    let calc = CvarCalculator::new(dec!(0.95), 20);
    assert_eq!(calc.tail_risk(&series).unwrap(), calc.tail_risk(&reversed).unwrap());
}

#[test]
fn test_kelly_fraction_bounded() {
    for seed in 1..50 {
        let stats = TradeStats::from_returns(&returns(seed, 40));
        let f = KellyCalculator::fraction(stats.win_rate(), stats.avg_win(), stats.avg_loss());
        assert!(f >= dec!(0) && f <= dec!(1), "seed {seed}: fraction {f}");
    }
}

#[test]
fn test_kelly_reference_values() {
    assert_eq!(
        KellyCalculator::fraction(dec!(0.55), dec!(0.04), dec!(0.025)),
        dec!(0.26875)
    );
    assert_eq!(
        KellyCalculator::confidence(214, 25).round_dp(4),
        dec!(0.8954)
    );
}

#[test]
fn test_max_risk_deterministic() {
    let calc = KellyCalculator::new(dec!(0.02), 30);
    let stats = TradeStats::new(vec![dec!(0.04); 110], vec![dec!(0.025); 90]);
    let first = calc.calculate(&stats, 10, dec!(250000)).unwrap();
    let second = calc.calculate(&stats, 10, dec!(250000)).unwrap();
    assert_eq!(first.max_risk_usd, second.max_risk_usd);
    assert!(first.max_risk_usd > dec!(0));
}

#[test]
fn test_risk_shares_sum_to_one() {
    for seed in 1..30 {
        let r = returns(seed, 2);
        let trading = r[0].abs() * dec!(10000) + dec!(1);
        let investment = r[1].abs() * dec!(25000);
        let (t, i) = risk_shares(trading, investment, dec!(10000), dec!(25000));
        assert_eq!(t + i, dec!(1), "seed {seed}");
    }
}
