//! Failure classification and recovery strategy selection.
//!
//! The [`RecoveryEngine`] turns one capability failure into a
//! [`RecoveryStrategy`]:
//!
//! 1. The error text is classified into an [`ErrorCategory`] by
//!    [`classify_error`].
//! 2. Geometry conflicts are skipped and unknown failures escalated
//!    immediately, whatever the retry count.
//! 3. Every other category escalates once the step's retry count reaches
//!    `max_retries`, and otherwise maps to a fixed retry strategy:
//!
//! | Category | Action | Delay |
//! |---|---|---|
//! | InvalidParameter | RetryWithModification | invalid_parameter_ms |
//! | ElementNotFound | RefreshContextAndRetry | element_not_found_ms |
//! | TypeNotAvailable | RetryWithAlternative | type_not_available_ms |
//! | TransactionFailed | RollbackAndRetry | transaction_failed_ms |
//! | Timeout | RetryWithModification ("reduce scope") | timeout_ms |
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//!
//! use waypoint_core::{
//!     config::EngineConfig,
//!     recovery::{FailureContext, RecoveryAction, RecoveryEngine},
//! };
//!
//! let engine = RecoveryEngine::new(&EngineConfig::default());
//! let strategy = engine.decide(&FailureContext::new(2, "Element not found: Level B", 0));
//!
//! assert_eq!(strategy.action, RecoveryAction::RefreshContextAndRetry);
//! assert_eq!(strategy.retry_delay, Duration::from_millis(500));
//! ```

pub mod classify;
pub mod strategy;


use log::debug;
use serde_json::Value;

pub use classify::{classify_error, ErrorCategory};
pub use strategy::{RecoveryAction, RecoveryStrategy};

use crate::{
    config::{EngineConfig, RetryDelays},
    escalation::Escalation,
};

/// Everything the engine knows about one failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureContext {
    pub step_number: u32,
    /// Raw error text reported by the capability
    pub error: String,
    /// Capability that failed
    pub tool: Option<String>,
    /// Input the capability was called with
    pub input: Value,
    /// Budgeted retries already recorded for the step
    pub retry_count: u32,
}

impl FailureContext {
    pub fn new(step_number: u32, error: impl Into<String>, retry_count: u32) -> Self {
        Self {
            step_number,
            error: error.into(),
            tool: None,
            input: Value::Null,
            retry_count,
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>, input: Value) -> Self {
        self.tool = Some(tool.into());
        self.input = input;
        self
    }
}

/// Chooses a recovery strategy for capability failures.
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    max_retries: u32,
    delays: RetryDelays,
}

impl RecoveryEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delays: config.retry_delays.clone(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide how to respond to a failure.
    pub fn decide(&self, failure: &FailureContext) -> RecoveryStrategy {
        let category = classify_error(&failure.error);
        let strategy = self.strategy_for(category, failure);

        debug!(
            "step {}: {} failure from {} (retry {}/{}) -> {}",
            failure.step_number,
            category,
            failure.tool.as_deref().unwrap_or("capability"),
            failure.retry_count,
            self.max_retries,
            strategy.action
        );

        strategy
    }

    fn strategy_for(&self, category: ErrorCategory, failure: &FailureContext) -> RecoveryStrategy {
        let strategy = match category {
            ErrorCategory::GeometryConflict => {
                return RecoveryStrategy::new(RecoveryAction::SkipAndContinue, failure.error.clone())
                    .with_message(format!(
                        "Skipping step {}: geometry conflicts are not resolved by retrying",
                        failure.step_number
                    ));
            }
            ErrorCategory::Unknown => {
                return self.escalate(failure, "Unclassified failure; not assumed transient");
            }
            _ if failure.retry_count >= self.max_retries => {
                return self.escalate(
                    failure,
                    format!("Retry budget of {} exhausted", self.max_retries),
                );
            }
            ErrorCategory::InvalidParameter => RecoveryStrategy::new(
                RecoveryAction::RetryWithModification,
                "Invalid parameter; adjust the input and retry",
            )
            .with_modification(classify::parameter_hint(&failure.error)),
            ErrorCategory::ElementNotFound => RecoveryStrategy::new(
                RecoveryAction::RefreshContextAndRetry,
                "Referenced element not found; refresh context before retrying",
            )
            .with_modification("Re-query current element ids before retrying"),
            ErrorCategory::TypeNotAvailable => RecoveryStrategy::new(
                RecoveryAction::RetryWithAlternative,
                "Requested type is not available",
            )
            .with_modification("Use an alternative type that is already loaded"),
            ErrorCategory::TransactionFailed => RecoveryStrategy::new(
                RecoveryAction::RollbackAndRetry,
                "Transaction failed; roll back before retrying",
            ),
            ErrorCategory::Timeout => RecoveryStrategy::new(
                RecoveryAction::RetryWithModification,
                "Operation timed out",
            )
            .with_modification("Reduce scope: split the operation into smaller batches"),
        };

        strategy.with_delay(self.delays.for_category(category))
    }

    fn escalate(&self, failure: &FailureContext, reason: impl Into<String>) -> RecoveryStrategy {
        let escalation = Escalation::new(
            failure.step_number,
            failure.retry_count.min(self.max_retries),
            &failure.error,
        );
        RecoveryStrategy::new(RecoveryAction::EscalateToUser, reason).with_message(escalation.message())
    }
}
