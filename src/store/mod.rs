//! Record store module
//!
//! Persistence seam for accounts, the Kelly input, positions, and the
//! transition log. Every write is a compare-and-swap on the record version.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::lifecycle::{Position, TransitionRecord};
use crate::risk::{Account, KellyInput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Consistent read of everything the allocation and signal paths need
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreView {
    pub accounts: Vec<Account>,
    pub positions: Vec<Position>,
    pub kelly_input: Option<KellyInput>,
}

impl StoreView {
    /// Symbols of positions that are not closed
    pub fn open_symbols(&self) -> Vec<String> {
        self.positions
            .iter()
            .filter(|p| p.is_open())
            .map(|p| p.symbol.clone())
            .collect()
    }
}

/// Trait for record store implementations
///
/// `expected_version` of 0 on an account or Kelly write means the record must
/// not exist yet. A mismatch fails with `ConcurrentModification` and leaves
/// the stored record untouched.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read all records under one lock
    async fn load_view(&self) -> Result<StoreView>;

    async fn get_account(&self, name: &str) -> Result<Option<Account>>;
    async fn save_account(&self, account: Account, expected_version: u64) -> Result<()>;

    async fn get_kelly_input(&self) -> Result<Option<KellyInput>>;
    async fn save_kelly_input(&self, input: KellyInput, expected_version: u64) -> Result<()>;

    async fn get_position(&self, symbol: &str) -> Result<Option<Position>>;
    async fn list_positions(&self) -> Result<Vec<Position>>;
    /// Insert a new record; fails with `AlreadyExists` on a symbol collision
    async fn insert_position(&self, position: Position) -> Result<()>;
    async fn save_position(&self, position: Position, expected_version: u64) -> Result<()>;
    /// Persist a stage change and its audit entry as one unit
    async fn commit_transition(
        &self,
        position: Position,
        expected_version: u64,
        record: TransitionRecord,
    ) -> Result<()>;

    /// Audit log in commit order
    async fn transition_log(&self) -> Result<Vec<TransitionRecord>>;
}
