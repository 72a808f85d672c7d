//! Engine error taxonomy
//!
//! Every variant is recoverable by the caller: retry, correct the input, or
//! wait for more data. Nothing in the engine treats these as fatal.

use crate::lifecycle::PortfolioStage;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single violated input constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Field the constraint applies to
    pub field: String,
    /// Human readable description
    pub message: String,
}

/// All constraints violated by one input, collected without short-circuiting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation against `field`
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Fold another set of violations into this one
    pub fn extend(&mut self, other: ValidationErrors) {
        self.violations.extend(other.violations);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// True if any violation was recorded for `field`
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// `Ok(())` when nothing was violated, otherwise `EngineError::Validation`
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", v.field, v.message)?;
        }
        Ok(())
    }
}

/// Errors raised by the risk engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Return series too short for a stable CVaR estimate
    #[error("Insufficient data: {required} observations required, {actual} supplied")]
    InsufficientData { required: usize, actual: usize },
    /// Too few primary trades for a reliable Kelly confidence
    #[error("Insufficient trades: {required} primary trades required, {actual} supplied")]
    InsufficientTrades { required: usize, actual: usize },
    /// User input failed one or more constraints
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    /// Lifecycle precondition not met
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: PortfolioStage,
        to: PortfolioStage,
    },
    /// Write was based on a stale version of the record
    #[error("Concurrent modification of {resource}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        resource: String,
        expected: u64,
        actual: u64,
    },
    /// External collaborator did not answer in time
    #[error("Upstream timeout during {operation} after {timeout_ms}ms")]
    UpstreamTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    /// Record lookup failed
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
    /// Insert collided with an existing record
    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: &'static str, key: String },
}

impl EngineError {
    /// Single-violation validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.push(field, message);
        EngineError::Validation(errors)
    }

    /// Whether the caller can simply retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ConcurrentModification { .. } | EngineError::UpstreamTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
