//! Status enumerations for plans and steps.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Primary lifecycle status of a step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step has not been started
    #[default]
    Pending,

    /// Step is being worked on
    InProgress,

    /// Step finished successfully
    Completed,

    /// Step gave up after recovery was exhausted
    Failed,

    /// Step was bypassed
    Skipped,
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StepStatus::Pending),
            "inprogress" | "in_progress" => Ok(StepStatus::InProgress),
            "completed" => Ok(StepStatus::Completed),
            "failed" => Ok(StepStatus::Failed),
            "skipped" => Ok(StepStatus::Skipped),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Whether the step has reached a status it never leaves on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }

    /// Whether moving from `self` to `next` is an allowed transition.
    ///
    /// The allowed set is Pending→InProgress, InProgress→Completed,
    /// InProgress→Failed and any→Skipped.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::InProgress)
                | (StepStatus::InProgress, StepStatus::Completed)
                | (StepStatus::InProgress, StepStatus::Failed)
                | (_, StepStatus::Skipped)
        )
    }

    /// Get status with consistent icon formatting for display.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use waypoint_core::models::StepStatus;
    ///
    /// assert_eq!(StepStatus::Completed.with_icon(), "✓ Completed");
    /// assert_eq!(StepStatus::InProgress.with_icon(), "➤ In Progress");
    /// assert_eq!(StepStatus::Pending.with_icon(), "○ Pending");
    /// ```
    pub fn with_icon(&self) -> &'static str {
        match self {
            StepStatus::Pending => "○ Pending",
            StepStatus::InProgress => "➤ In Progress",
            StepStatus::Completed => "✓ Completed",
            StepStatus::Failed => "✗ Failed",
            StepStatus::Skipped => "↷ Skipped",
        }
    }
}

/// Terminal outcome of a plan. Unset while the plan is active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Success,
    PartialSuccess,
    Failed,
    Cancelled,
}

impl FromStr for CompletionStatus {
    type Err = String;

    /// Parses the statuses a caller may report through `complete_plan`.
    /// `cancelled` is reserved for the engine and is rejected here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(CompletionStatus::Success),
            "partial_success" | "partialsuccess" | "partial" => {
                Ok(CompletionStatus::PartialSuccess)
            }
            "failed" => Ok(CompletionStatus::Failed),
            _ => Err(format!(
                "Invalid completion status: {s}. Must be 'success', 'partial_success', or 'failed'"
            )),
        }
    }
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Success => "success",
            CompletionStatus::PartialSuccess => "partial_success",
            CompletionStatus::Failed => "failed",
            CompletionStatus::Cancelled => "cancelled",
        }
    }

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            CompletionStatus::Success => "Success",
            CompletionStatus::PartialSuccess => "Partial Success",
            CompletionStatus::Failed => "Failed",
            CompletionStatus::Cancelled => "Cancelled",
        }
    }
}

/// Outcome of an automatic verification check, orthogonal to
/// [`StepStatus`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// A check ran but reported nothing conclusive yet
    Pending,
    Passed,
    Issues,
    Failed,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Passed => "passed",
            VerificationStatus::Issues => "issues",
            VerificationStatus::Failed => "failed",
        }
    }
}
