//! Signal evaluation module
//!
//! Sizes candidates, ranks them by conviction, and admits them against the
//! daily deployment budget

mod budget;
mod conviction;
mod evaluator;
mod types;

pub use budget::{admit, DeploymentBudget, DeploymentLedger};
pub use conviction::{ConvictionBreakdown, ConvictionScorer};
pub use evaluator::{validate_candidate, EvaluationContext, SignalEvaluator};
pub use types::{Admission, Candidate, RankedSignal, Signal};
