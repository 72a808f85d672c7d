//! Field validation for manual position entry and edits
//!
//! Every check runs; violations are collected rather than returned on the
//! first failure.

use super::types::{CurrentStatus, NewPosition, PortfolioStage, Position, PositionPatch, StopStatus};
use crate::error::ValidationErrors;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Longest accepted ticker
pub const MAX_SYMBOL_LEN: usize = 12;
/// Longest accepted notes field
pub const MAX_NOTES_LEN: usize = 2000;

/// Check ticker format: uppercase letters and digits, plus `.`, `-` and `/`
/// after the first character
pub fn check_symbol(symbol: &str, errors: &mut ValidationErrors) {
    if symbol.is_empty() {
        errors.push("symbol", "must not be empty");
        return;
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        errors.push(
            "symbol",
            format!("must be at most {MAX_SYMBOL_LEN} characters, got {}", symbol.len()),
        );
    }
    let mut chars = symbol.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    let rest_ok = chars.all(|c| {
        c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '/')
    });
    if !first_ok || !rest_ok {
        errors.push(
            "symbol",
            format!("'{symbol}' must be uppercase letters or digits, optionally with . - /"),
        );
    }
}

pub fn check_size(size_usd: Decimal, errors: &mut ValidationErrors) {
    if size_usd <= dec!(0) {
        errors.push("size_usd", format!("must be greater than zero, got {size_usd}"));
    }
}

pub fn check_entry_date(entry_date: DateTime<Utc>, now: DateTime<Utc>, errors: &mut ValidationErrors) {
    if entry_date > now {
        errors.push(
            "entry_date",
            format!("must not be in the future, got {}", entry_date.to_rfc3339()),
        );
    }
}

pub fn check_notes(notes: &str, errors: &mut ValidationErrors) {
    if notes.chars().count() > MAX_NOTES_LEN {
        errors.push("notes", format!("must be at most {MAX_NOTES_LEN} characters"));
    }
}

/// A stage past Risk-On requires a protected stop
pub fn check_stage_invariant(
    stage: PortfolioStage,
    stop_status: StopStatus,
    errors: &mut ValidationErrors,
) {
    if stage != PortfolioStage::RiskOn && stop_status != StopStatus::Protected {
        errors.push(
            "stop_status",
            format!("must be Protected for a position in stage {stage}"),
        );
    }
}

/// Allowed status edits: Pending -> Active -> Closed, Closed is terminal
pub fn status_change_allowed(from: CurrentStatus, to: CurrentStatus) -> bool {
    use CurrentStatus::*;
    matches!(
        (from, to),
        (Active, Active)
            | (Pending, Pending)
            | (Closed, Closed)
            | (Pending, Active)
            | (Pending, Closed)
            | (Active, Closed)
    )
}

/// Validate a record for manual entry
pub fn validate_new(position: &NewPosition, now: DateTime<Utc>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    check_symbol(&position.symbol, &mut errors);
    check_size(position.size_usd, &mut errors);
    check_entry_date(position.entry_date, now, &mut errors);
    check_notes(&position.notes, &mut errors);
    check_stage_invariant(position.portfolio_stage, position.stop_status, &mut errors);
    errors
}

/// Validate a patch against the record it would be applied to
pub fn validate_patch(
    current: &Position,
    patch: &PositionPatch,
    now: DateTime<Utc>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if patch.is_empty() {
        errors.push("patch", "no fields to update");
        return errors;
    }
    if let Some(size) = patch.size_usd {
        check_size(size, &mut errors);
    }
    if let Some(date) = patch.entry_date {
        check_entry_date(date, now, &mut errors);
    }
    if let Some(notes) = &patch.notes {
        check_notes(notes, &mut errors);
    }
    if let Some(status) = patch.current_status {
        if !status_change_allowed(current.current_status, status) {
            errors.push(
                "current_status",
                format!("cannot change from {} to {status}", current.current_status),
            );
        }
    }
    if let Some(stop) = patch.stop_status {
        check_stage_invariant(current.portfolio_stage, stop, &mut errors);
    }
    errors
}
