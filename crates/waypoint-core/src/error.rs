//! Error types for the execution engine.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{CompletionStatus, StepStatus};

/// Error type for every fallible engine operation.
///
/// Capability failures are deliberately absent: an action that reports failure
/// is a value routed through the recovery engine, not an error.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A planning call arrived while the session holds no plan
    #[error("No active plan. Call create_plan first")]
    NoActivePlan,
    /// Step not found for the given step number
    #[error("Step {step_number} not found in the current plan")]
    StepNotFound { step_number: u32 },
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// A status change outside the allowed transition set
    #[error("Step {step_number} cannot move from {from} to {to}")]
    InvalidTransition {
        step_number: u32,
        from: StepStatus,
        to: StepStatus,
    },
    /// A step was started before one of its prerequisites completed
    #[error("Step {step_number} depends on step {prerequisite}, which is not completed")]
    PrerequisiteIncomplete { step_number: u32, prerequisite: u32 },
    /// `complete_plan` called again with different arguments
    #[error("Plan already completed with status {status}")]
    PlanAlreadyCompleted { status: CompletionStatus },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> EngineError {
        EngineError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl EngineError {
    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// Whether this error is a rejected planning call.
    ///
    /// Validation errors are raised before any state is touched, so callers
    /// can safely correct the request and try again.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::NoActivePlan
                | EngineError::StepNotFound { .. }
                | EngineError::InvalidInput { .. }
                | EngineError::InvalidTransition { .. }
                | EngineError::PrerequisiteIncomplete { .. }
                | EngineError::PlanAlreadyCompleted { .. }
        )
    }
}

/// Extension trait for Result to attach context while converting into a
/// configuration error.
pub trait ResultExt<T> {
    /// Add context to any error type, converting to EngineError.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display,
    {
        self.map_err(|e| EngineError::Configuration {
            message: format!("{}: {}", context, e),
        })
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
