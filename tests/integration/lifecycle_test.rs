//! Integration tests for the position lifecycle through the engine

use chrono::{Duration, Utc};
use risk_alloc::config::{Config, KellyConfig};
use risk_alloc::engine::RiskEngine;
use risk_alloc::error::EngineError;
use risk_alloc::lifecycle::{
    CurrentStatus, NewPosition, PortfolioStage, PositionPatch, StopStatus,
};
use risk_alloc::store::MemoryStore;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn engine() -> RiskEngine<MemoryStore> {
    RiskEngine::new(
        Config::with_kelly(KellyConfig::new(dec!(0.02))),
        Arc::new(MemoryStore::new()),
    )
}

fn protect() -> PositionPatch {
    PositionPatch {
        stop_status: Some(StopStatus::Protected),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_repeated_transition_fails() {
    let engine = engine();
    assert_ok!(
        engine
            .add_position(NewPosition::risk_on("GOOG", dec!(3000), Utc::now()))
            .await
    );
    assert_ok!(engine.update_position("GOOG", protect()).await);
    assert_ok!(
        engine
            .transition_position("GOOG", PortfolioStage::Protected)
            .await
    );

    let err = engine
        .transition_position("GOOG", PortfolioStage::Protected)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid transition from Protected to Protected"
    );
    assert_eq!(engine.transition_log().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_risk_stop_blocks_protection() {
    let engine = engine();
    assert_ok!(
        engine
            .add_position(NewPosition::risk_on("META", dec!(2500), Utc::now()))
            .await
    );

    let result = engine
        .transition_position("META", PortfolioStage::Protected)
        .await;
    assert!(matches!(
        result,
        Err(EngineError::InvalidTransition {
            from: PortfolioStage::RiskOn,
            to: PortfolioStage::Protected,
        })
    ));

    // Record unchanged
    let positions = engine.positions().await.unwrap();
    assert_eq!(positions[0].portfolio_stage, PortfolioStage::RiskOn);
    assert_eq!(positions[0].version, 1);
}

#[tokio::test]
async fn test_protected_stop_cannot_revert_after_advance() {
    let engine = engine();
    assert_ok!(
        engine
            .add_position(NewPosition::risk_on("AMZN", dec!(2000), Utc::now()))
            .await
    );
    assert_ok!(engine.update_position("AMZN", protect()).await);
    assert_ok!(
        engine
            .transition_position("AMZN", PortfolioStage::Protected)
            .await
    );

    let result = engine
        .update_position(
            "AMZN",
            PositionPatch {
                stop_status: Some(StopStatus::Risk),
                ..Default::default()
            },
        )
        .await;
    match assert_err!(result) {
        EngineError::Validation(errors) => assert!(errors.has_field("stop_status")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_closed_position_is_terminal() {
    let engine = engine();
    assert_ok!(
        engine
            .add_position(NewPosition::risk_on("INTC", dec!(800), Utc::now()))
            .await
    );
    assert_ok!(
        engine
            .update_position(
                "INTC",
                PositionPatch {
                    current_status: Some(CurrentStatus::Closed),
                    stop_status: Some(StopStatus::Protected),
                    ..Default::default()
                },
            )
            .await
    );

    assert_err!(
        engine
            .transition_position("INTC", PortfolioStage::Protected)
            .await
    );
    assert_err!(
        engine
            .update_position(
                "INTC",
                PositionPatch {
                    current_status: Some(CurrentStatus::Active),
                    ..Default::default()
                },
            )
            .await
    );
}

#[tokio::test]
async fn test_validation_reports_every_field() {
    let engine = engine();
    let record = NewPosition::risk_on("not a symbol", dec!(-5), Utc::now() + Duration::hours(2))
        .with_notes("x".repeat(3000));

    match engine.add_position(record).await {
        Err(EngineError::Validation(errors)) => {
            assert_eq!(errors.len(), 4);
            for field in ["symbol", "size_usd", "entry_date", "notes"] {
                assert!(errors.has_field(field), "missing {field}");
            }
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(engine.positions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_symbol_rejected() {
    let engine = engine();
    let record = NewPosition::risk_on("ORCL", dec!(1000), Utc::now());
    assert_ok!(engine.add_position(record.clone()).await);
    let err = engine.add_position(record).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_unknown_symbol() {
    let engine = engine();
    let err = engine
        .transition_position("NONE", PortfolioStage::Protected)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "position", .. }));
}
