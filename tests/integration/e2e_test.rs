//! End-to-end integration tests

use chrono::Utc;
use risk_alloc::config::Config;
use risk_alloc::engine::RiskEngine;
use risk_alloc::lifecycle::{NewPosition, PortfolioStage, PositionPatch, StopStatus};
use risk_alloc::risk::{Book, KellySource, TradeStats};
use risk_alloc::signal::{Admission, Candidate};
use risk_alloc::store::MemoryStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[test]
fn test_config_example_loads() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert_eq!(config.risk.target_cvar, dec!(0.118));
    assert_eq!(config.kelly.risk_per_trade_constant, dec!(0.02));
    assert_eq!(config.engine.cycle_interval_secs, 30);
}

#[test]
fn test_config_requires_kelly_constant() {
    let result: Result<Config, _> = toml::from_str("[risk]\ntarget_cvar = 0.118\n");
    assert!(result.is_err());
}

fn series(worst: Decimal) -> Vec<Decimal> {
    let mut r = vec![dec!(0.012); 19];
    r.push(worst);
    r
}

async fn engine() -> RiskEngine<MemoryStore> {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    let engine = RiskEngine::new(config, Arc::new(MemoryStore::new()));
    engine
        .update_book_returns(Book::RiskOn, series(dec!(-0.05)))
        .await;
    engine
        .update_book_returns(Book::Investment, series(dec!(-0.10)))
        .await;
    engine.update_account_balance("A", dec!(10000)).await.unwrap();
    engine.update_account_balance("B", dec!(5000)).await.unwrap();
    engine
        .upsert_account("C", dec!(2000), Book::Investment)
        .await
        .unwrap();
    engine
}

#[tokio::test]
async fn test_seed_to_investment() {
    let engine = engine().await;

    // Journal with 55% winners averaging 4%, losers averaging 2.5%
    let mut journal = vec![dec!(0.04); 55];
    journal.extend(vec![dec!(-0.025); 45]);
    let estimate = engine
        .recalculate_kelly(&TradeStats::from_returns(&journal), 0)
        .await
        .unwrap();
    assert_eq!(estimate.fraction, dec!(0.26875));
    // 0.26875 * 1 * 17000 * 0.02
    assert_eq!(estimate.max_risk_usd, dec!(91.375));

    let snapshot = engine.get_risk_snapshot().await.unwrap();
    assert_eq!(snapshot.allocation.risk_amount_usd, dec!(2006));
    assert_eq!(
        snapshot.trading.risk_share + snapshot.investment.risk_share,
        dec!(1)
    );

    let candidates = vec![
        Candidate::new("NVDA", dec!(120), dec!(0.25), dec!(600))
            .with_scores(dec!(0.9), dec!(0.8))
            .with_regime_aligned(true),
        Candidate::new("XOM", dec!(110), dec!(0.10), dec!(400)).with_scores(dec!(0.4), dec!(0.5)),
    ];
    let report = engine.evaluate_cycle(&candidates).await.unwrap();
    assert_eq!(report.signals[0].signal.symbol, "NVDA");
    assert_eq!(report.signals[0].admission, Admission::Admitted);
    // 850 budget: 600 admitted, 400 no longer fits
    assert_eq!(report.signals[1].admission, Admission::Deferred);

    let position = engine
        .accept_signal(&report.signals[0].signal)
        .await
        .unwrap();
    assert_eq!(position.size_usd, dec!(600));

    engine
        .update_position(
            "NVDA",
            PositionPatch {
                stop_status: Some(StopStatus::Protected),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    engine
        .transition_position("NVDA", PortfolioStage::Protected)
        .await
        .unwrap();
    let position = engine
        .transition_position("NVDA", PortfolioStage::Investment)
        .await
        .unwrap();
    assert_eq!(position.portfolio_stage, PortfolioStage::Investment);

    let log = engine.transition_log().await.unwrap();
    let stages: Vec<_> = log.iter().map(|r| (r.from_stage, r.to_stage)).collect();
    assert_eq!(
        stages,
        vec![
            (PortfolioStage::RiskOn, PortfolioStage::Protected),
            (PortfolioStage::Protected, PortfolioStage::Investment),
        ]
    );
}

#[tokio::test]
async fn test_oversized_proposal_is_advisory() {
    let engine = engine().await;
    engine
        .update_kelly_input(dec!(0.1), KellySource::Manual, "conservative")
        .await
        .unwrap();

    let candidate = Candidate::new("TSLA", dec!(250), dec!(0.4), dec!(9000));
    let signal = engine.evaluate_signal(&candidate).await.unwrap();

    // 17000 * 0.1 * 0.6
    assert_eq!(signal.kelly_position_usd, dec!(1020));
    assert!(signal.kelly_efficiency.unwrap() > dec!(1));
    assert_eq!(signal.allocated_units, dec!(36));
}

#[tokio::test]
async fn test_entry_date_in_future_rejected() {
    let engine = engine().await;
    let record = NewPosition::risk_on(
        "AAPL",
        dec!(1000),
        Utc::now() + chrono::Duration::days(1),
    );
    let err = engine.add_position(record).await.unwrap_err();
    assert!(err.to_string().contains("entry_date"));
}
