//! Position lifecycle module
//!
//! Position records, field validation, and the Risk-On -> Protected ->
//! Investment state machine

mod manager;
mod types;
mod validation;

pub use manager::{can_transition, PositionLifecycleManager};
pub use types::{
    CurrentStatus, NewPosition, PortfolioStage, Position, PositionPatch, StopStatus,
    TransitionRecord,
};
pub use validation::{check_symbol, validate_new, validate_patch, MAX_NOTES_LEN, MAX_SYMBOL_LEN};
