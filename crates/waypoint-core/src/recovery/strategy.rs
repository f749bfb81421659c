//! Recovery strategy vocabulary.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// What the dispatcher should do after a failed attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    RetryWithModification,
    RefreshContextAndRetry,
    RetryWithAlternative,
    RollbackAndRetry,
    SkipAndContinue,
    EscalateToUser,
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::RetryWithModification => "retry_with_modification",
            RecoveryAction::RefreshContextAndRetry => "refresh_context_and_retry",
            RecoveryAction::RetryWithAlternative => "retry_with_alternative",
            RecoveryAction::RollbackAndRetry => "rollback_and_retry",
            RecoveryAction::SkipAndContinue => "skip_and_continue",
            RecoveryAction::EscalateToUser => "escalate_to_user",
        }
    }

    /// Whether the action leads to another attempt at the same capability.
    pub fn is_retry(&self) -> bool {
        matches!(
            self,
            RecoveryAction::RetryWithModification
                | RecoveryAction::RefreshContextAndRetry
                | RecoveryAction::RetryWithAlternative
                | RecoveryAction::RollbackAndRetry
        )
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The recovery engine's verdict on one failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryStrategy {
    pub action: RecoveryAction,

    /// Why this action was chosen
    pub reason: String,

    /// Input adjustment to pass to the next attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_modification: Option<String>,

    /// Human-facing text for escalations and skips
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Wait before the next attempt; zero for terminal actions
    #[serde(default)]
    pub retry_delay: Duration,
}

impl RecoveryStrategy {
    pub fn new(action: RecoveryAction, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
            suggested_modification: None,
            message: None,
            retry_delay: Duration::ZERO,
        }
    }

    pub fn with_modification(mut self, modification: impl Into<String>) -> Self {
        self.suggested_modification = Some(modification.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- Strategy: {}", self.action)?;
        writeln!(f, "- Reason: {}", self.reason)?;
        if !self.retry_delay.is_zero() {
            writeln!(f, "- Retry delay: {}ms", self.retry_delay.as_millis())?;
        }
        if let Some(modification) = &self.suggested_modification {
            writeln!(f, "- Suggested modification: {modification}")?;
        }
        if let Some(message) = &self.message {
            writeln!(f)?;
            writeln!(f, "{message}")?;
        }
        Ok(())
    }
}
