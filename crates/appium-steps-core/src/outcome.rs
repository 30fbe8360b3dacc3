//! Step results, handler errors and step records.
//!
//! Handlers return `Result<(), StepError>`. The [`Dispatcher`](crate::dispatcher::Dispatcher)
//! converts every handler result, and every resolution failure, into a
//! [`StepOutcome`] that is handed back to the test runner.
//!
//! # Example
//!
//! ```
//! use appium_steps_core::outcome::{FailureReason, StepOutcome, StepRecord};
//!
//! let outcome = StepOutcome::failure("I teleport the device", FailureReason::UndefinedStep);
//! let record = StepRecord::new("I teleport the device", outcome, 3);
//! println!("{} at {}", record.id, record.timestamp);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::context::ContextError;
use crate::driver::DriverError;

/// Errors a step handler may return.
#[derive(Error, Debug)]
pub enum StepError {
    /// A bounded wait on device state expired.
    #[error("Timeout after {elapsed_ms}ms waiting for {what}")]
    Timeout { what: String, elapsed_ms: u64 },

    /// An expectation about the UI did not hold.
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// An argument was well-typed but not acceptable, e.g. an unknown direction.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The handler asked for an argument the pattern does not provide.
    #[error("Missing {expected} argument at position {index}")]
    MissingArgument { index: usize, expected: &'static str },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Why a step failed.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// No registered pattern matches the phrase.
    #[error("Undefined step")]
    UndefinedStep,

    /// Several equally specific patterns match (strict mode only).
    #[error("Ambiguous step, matches: {}", .patterns.join(" | "))]
    AmbiguousMatch { patterns: Vec<String> },

    /// The phrase matched a pattern but an argument had the wrong type.
    #[error("Argument coercion failed for '{pattern}': {message}")]
    ArgumentCoercion { pattern: String, message: String },

    /// The handler returned an error or panicked.
    #[error("{message}")]
    HandlerError { message: String },

    /// The handler's bounded wait expired.
    #[error("{message}")]
    Timeout { message: String },
}

/// A failed step: the phrase and the cause.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("Step \"{phrase}\" failed: {reason}")]
pub struct StepFailure {
    pub phrase: String,
    pub reason: FailureReason,
}

/// Result of dispatching a single step.
#[must_use]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Failure(StepFailure),
    /// Not executed (an earlier step failed or the scenario was cancelled).
    Skipped,
}

impl StepOutcome {
    pub fn failure(phrase: impl Into<String>, reason: FailureReason) -> Self {
        StepOutcome::Failure(StepFailure {
            phrase: phrase.into(),
            reason,
        })
    }

    /// Maps a handler result onto an outcome for `phrase`.
    pub fn from_handler(phrase: &str, result: Result<(), StepError>) -> Self {
        match result {
            Ok(()) => StepOutcome::Success,
            Err(err @ StepError::Timeout { .. }) => StepOutcome::failure(
                phrase,
                FailureReason::Timeout {
                    message: err.to_string(),
                },
            ),
            Err(err) => StepOutcome::failure(
                phrase,
                FailureReason::HandlerError {
                    message: err.to_string(),
                },
            ),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failure(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped)
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            StepOutcome::Failure(f) => Some(&f.reason),
            _ => None,
        }
    }
}

/// One executed step with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Unique identifier for this record.
    pub id: Uuid,

    /// When the step finished.
    pub timestamp: DateTime<Utc>,

    /// The phrase as dispatched.
    pub phrase: String,

    pub outcome: StepOutcome,

    /// How long the step took in milliseconds.
    pub duration_ms: u64,
}

impl StepRecord {
    pub fn new(phrase: impl Into<String>, outcome: StepOutcome, duration_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            phrase: phrase.into(),
            outcome,
            duration_ms,
        }
    }
}
