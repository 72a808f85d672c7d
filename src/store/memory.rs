//! In-memory record store

use super::{RecordStore, StoreView};
use crate::error::{EngineError, Result};
use crate::lifecycle::{Position, TransitionRecord};
use crate::risk::{Account, KellyInput};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<String, Account>,
    kelly_input: Option<KellyInput>,
    positions: BTreeMap<String, Position>,
    transitions: Vec<TransitionRecord>,
}

fn check_version(resource: String, expected: u64, actual: u64) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(EngineError::ConcurrentModification {
            resource,
            expected,
            actual,
        })
    }
}

/// Record store held in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, to stand in for a slow remote store
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load_view(&self) -> Result<StoreView> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(StoreView {
            accounts: tables.accounts.values().cloned().collect(),
            positions: tables.positions.values().cloned().collect(),
            kelly_input: tables.kelly_input.clone(),
        })
    }

    async fn get_account(&self, name: &str) -> Result<Option<Account>> {
        self.delay().await;
        Ok(self.tables.read().await.accounts.get(name).cloned())
    }

    async fn save_account(&self, account: Account, expected_version: u64) -> Result<()> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        let actual = tables.accounts.get(&account.name).map_or(0, |a| a.version);
        check_version(format!("account {}", account.name), expected_version, actual)?;
        tables.accounts.insert(account.name.clone(), account);
        Ok(())
    }

    async fn get_kelly_input(&self) -> Result<Option<KellyInput>> {
        self.delay().await;
        Ok(self.tables.read().await.kelly_input.clone())
    }

    async fn save_kelly_input(&self, input: KellyInput, expected_version: u64) -> Result<()> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        let actual = tables.kelly_input.as_ref().map_or(0, |k| k.version);
        check_version("kelly input".to_string(), expected_version, actual)?;
        tables.kelly_input = Some(input);
        Ok(())
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>> {
        self.delay().await;
        Ok(self.tables.read().await.positions.get(symbol).cloned())
    }

    async fn list_positions(&self) -> Result<Vec<Position>> {
        self.delay().await;
        Ok(self.tables.read().await.positions.values().cloned().collect())
    }

    async fn insert_position(&self, position: Position) -> Result<()> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        if tables.positions.contains_key(&position.symbol) {
            return Err(EngineError::AlreadyExists {
                kind: "position",
                key: position.symbol,
            });
        }
        tables.positions.insert(position.symbol.clone(), position);
        Ok(())
    }

    async fn save_position(&self, position: Position, expected_version: u64) -> Result<()> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        let actual = stored_position_version(&tables, &position.symbol)?;
        check_version(format!("position {}", position.symbol), expected_version, actual)?;
        tables.positions.insert(position.symbol.clone(), position);
        Ok(())
    }

    async fn commit_transition(
        &self,
        position: Position,
        expected_version: u64,
        record: TransitionRecord,
    ) -> Result<()> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        let actual = stored_position_version(&tables, &position.symbol)?;
        check_version(format!("position {}", position.symbol), expected_version, actual)?;
        tables.positions.insert(position.symbol.clone(), position);
        tables.transitions.push(record);
        Ok(())
    }

    async fn transition_log(&self) -> Result<Vec<TransitionRecord>> {
        self.delay().await;
        Ok(self.tables.read().await.transitions.clone())
    }
}

fn stored_position_version(tables: &Tables, symbol: &str) -> Result<u64> {
    tables
        .positions
        .get(symbol)
        .map(|p| p.version)
        .ok_or_else(|| EngineError::NotFound {
            kind: "position",
            key: symbol.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{NewPosition, PortfolioStage, PositionLifecycleManager};
    use crate::risk::Book;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn position(symbol: &str) -> Position {
        let now = Utc::now();
        PositionLifecycleManager::new()
            .create(NewPosition::risk_on(symbol, dec!(1000), now), now)
            .unwrap()
    }

    #[tokio::test]
    async fn test_account_insert_then_stale_write() {
        let store = MemoryStore::new();
        let mut account = Account::new("IBKR", dec!(10000), Book::RiskOn);
        account.version = 1;
        store.save_account(account.clone(), 0).await.unwrap();

        // A second writer that also read version 0
        let err = store.save_account(account, 0).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::ConcurrentModification {
                expected: 0,
                actual: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_position_rejected() {
        let store = MemoryStore::new();
        store.insert_position(position("AAPL")).await.unwrap();
        let err = store.insert_position(position("AAPL")).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_commit_transition_is_atomic() {
        let store = MemoryStore::new();
        let original = position("MSFT");
        store.insert_position(original.clone()).await.unwrap();

        let mut moved = original.clone();
        moved.portfolio_stage = PortfolioStage::Protected;
        moved.version = 2;
        let record = TransitionRecord {
            id: uuid::Uuid::new_v4(),
            symbol: "MSFT".to_string(),
            from_stage: PortfolioStage::RiskOn,
            to_stage: PortfolioStage::Protected,
            timestamp: Utc::now(),
        };

        // Stale version: neither the record nor the log entry lands
        let err = store
            .commit_transition(moved.clone(), 5, record.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ConcurrentModification { .. }));
        assert!(store.transition_log().await.unwrap().is_empty());
        assert_eq!(
            store.get_position("MSFT").await.unwrap().unwrap().portfolio_stage,
            PortfolioStage::RiskOn
        );

        store.commit_transition(moved, 1, record).await.unwrap();
        assert_eq!(store.transition_log().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_unknown_position() {
        let store = MemoryStore::new();
        let err = store.save_position(position("NFLX"), 1).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { kind: "position", .. }));
    }

    #[tokio::test]
    async fn test_view_lists_open_symbols() {
        let store = MemoryStore::new();
        store.insert_position(position("AAA")).await.unwrap();
        let mut closed = position("BBB");
        closed.current_status = crate::lifecycle::CurrentStatus::Closed;
        store.insert_position(closed).await.unwrap();

        let view = store.load_view().await.unwrap();
        assert_eq!(view.positions.len(), 2);
        assert_eq!(view.open_symbols(), vec!["AAA".to_string()]);
    }
}
