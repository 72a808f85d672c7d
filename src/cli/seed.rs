//! JSON fixtures for the CLI
//!
//! A seed file describes accounts, return series, the Kelly input and any
//! open positions; it is replayed through the engine so every record passes
//! the same validation as a live write.

use crate::engine::RiskEngine;
use crate::lifecycle::NewPosition;
use crate::risk::{Book, BookReturns, KellySource, TradeStats};
use crate::signal::Candidate;
use crate::store::RecordStore;
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAccount {
    pub name: String,
    pub balance: Decimal,
    #[serde(default)]
    pub book: Book,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedKelly {
    pub fraction: Decimal,
    #[serde(default = "default_kelly_source")]
    pub source: KellySource,
    #[serde(default)]
    pub notes: String,
}

fn default_kelly_source() -> KellySource {
    KellySource::Manual
}

/// Trade journal to derive the Kelly input from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedJournal {
    /// Per-trade returns with outliers already removed
    pub returns: Vec<Decimal>,
    #[serde(default)]
    pub outliers_excluded: usize,
}

/// Engine state loaded from a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedState {
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
    #[serde(default)]
    pub returns: BookReturns,
    /// Explicit Kelly input; ignored when `journal` is present
    pub kelly: Option<SeedKelly>,
    pub journal: Option<SeedJournal>,
    #[serde(default)]
    pub positions: Vec<NewPosition>,
}

impl SeedState {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed state {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing seed state {}", path.display()))
    }

    /// Replay the seed through `engine`
    pub async fn apply<S: RecordStore>(&self, engine: &RiskEngine<S>) -> anyhow::Result<()> {
        engine
            .update_book_returns(Book::RiskOn, self.returns.risk_on.clone())
            .await;
        engine
            .update_book_returns(Book::Investment, self.returns.investment.clone())
            .await;

        for account in &self.accounts {
            engine
                .upsert_account(&account.name, account.balance, account.book)
                .await
                .with_context(|| format!("seeding account {}", account.name))?;
        }

        match (&self.journal, &self.kelly) {
            (Some(journal), _) => {
                let trades = TradeStats::from_returns(&journal.returns);
                engine
                    .recalculate_kelly(&trades, journal.outliers_excluded)
                    .await
                    .context("deriving Kelly input from journal")?;
            }
            (None, Some(kelly)) => {
                engine
                    .update_kelly_input(kelly.fraction, kelly.source, kelly.notes.clone())
                    .await
                    .context("seeding Kelly input")?;
            }
            (None, None) => {}
        }

        for position in &self.positions {
            engine
                .add_position(position.clone())
                .await
                .with_context(|| format!("seeding position {}", position.symbol))?;
        }

        tracing::info!(
            accounts = self.accounts.len(),
            positions = self.positions.len(),
            "Seed state applied"
        );
        Ok(())
    }
}

/// Read a JSON array of candidates
pub fn load_candidates(path: impl AsRef<Path>) -> anyhow::Result<Vec<Candidate>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading candidates {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing candidates {}", path.display()))
}
