//! Lifecycle state machine
//!
//! ```text
//! RiskOn(stop=Risk) -> RiskOn(stop=Protected) -> Protected -> Investment
//! ```
//!
//! The manager is pure: it produces the next version of a record plus the
//! audit entry, and the caller commits both to the store as one unit.

use super::types::{
    CurrentStatus, NewPosition, PortfolioStage, Position, PositionPatch, StopStatus,
    TransitionRecord,
};
use super::validation::{validate_new, validate_patch};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Central transition table
///
/// Only forward, single-step moves exist. `RiskOn -> Protected` additionally
/// needs the stop already at breakeven, and closed positions never move.
pub fn can_transition(position: &Position, to: PortfolioStage) -> bool {
    if position.current_status == CurrentStatus::Closed {
        return false;
    }
    match (position.portfolio_stage, to) {
        (PortfolioStage::RiskOn, PortfolioStage::Protected) => {
            position.stop_status == StopStatus::Protected
        }
        (PortfolioStage::Protected, PortfolioStage::Investment) => true,
        _ => false,
    }
}

/// Enforces stage transitions and field edits for position records
#[derive(Debug, Clone, Default)]
pub struct PositionLifecycleManager;

impl PositionLifecycleManager {
    pub fn new() -> Self {
        Self
    }

    /// Build the first version of a record after validation
    pub fn create(&self, record: NewPosition, now: DateTime<Utc>) -> Result<Position> {
        validate_new(&record, now).into_result()?;

        Ok(Position {
            symbol: record.symbol,
            size_usd: record.size_usd,
            entry_date: record.entry_date,
            current_status: record.current_status,
            stop_status: record.stop_status,
            portfolio_stage: record.portfolio_stage,
            notes: record.notes,
            version: 1,
            updated_at: now,
        })
    }

    /// Next version of `current` with `patch` applied
    pub fn apply_patch(
        &self,
        current: &Position,
        patch: &PositionPatch,
        now: DateTime<Utc>,
    ) -> Result<Position> {
        validate_patch(current, patch, now).into_result()?;

        let mut next = current.clone();
        if let Some(size) = patch.size_usd {
            next.size_usd = size;
        }
        if let Some(date) = patch.entry_date {
            next.entry_date = date;
        }
        if let Some(notes) = &patch.notes {
            next.notes = notes.clone();
        }
        if let Some(status) = patch.current_status {
            next.current_status = status;
        }
        if let Some(stop) = patch.stop_status {
            next.stop_status = stop;
        }
        next.version = current.version + 1;
        next.updated_at = now;
        Ok(next)
    }

    /// Next version of `current` in stage `to`, with its audit entry
    pub fn transition(
        &self,
        current: &Position,
        to: PortfolioStage,
        now: DateTime<Utc>,
    ) -> Result<(Position, TransitionRecord)> {
        if !can_transition(current, to) {
            return Err(EngineError::InvalidTransition {
                from: current.portfolio_stage,
                to,
            });
        }

        let mut next = current.clone();
        next.portfolio_stage = to;
        next.version = current.version + 1;
        next.updated_at = now;

        let record = TransitionRecord {
            id: Uuid::new_v4(),
            symbol: current.symbol.clone(),
            from_stage: current.portfolio_stage,
            to_stage: to,
            timestamp: now,
        };

        Ok((next, record))
    }
}
