//! Plan model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{CompletionStatus, Step};

/// An ordered set of steps pursuing a stated goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// What the plan is trying to achieve
    pub goal: String,

    /// Steps in execution order
    #[serde(default)]
    pub steps: Vec<Step>,

    /// How the caller intends to verify the outcome (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_approach: Option<String>,

    /// How the caller intends to undo partial work (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_strategy: Option<String>,

    /// Expected number of capability invocations (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_tool_calls: Option<u32>,

    /// Terminal outcome, unset while the plan is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_status: Option<CompletionStatus>,

    /// Timestamp when the plan was created (UTC)
    pub created_at: Timestamp,

    /// Timestamp when the plan reached a completion status (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl Plan {
    /// Whether the plan is still accepting step work.
    pub fn is_active(&self) -> bool {
        self.completion_status.is_none()
    }

    pub fn step(&self, step_number: u32) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_number == step_number)
    }

    pub fn step_mut(&mut self, step_number: u32) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.step_number == step_number)
    }

    /// Position of a step in execution order.
    pub fn position_of(&self, step_number: u32) -> Option<usize> {
        self.steps.iter().position(|s| s.step_number == step_number)
    }

    /// The step currently in progress, if any.
    pub fn current_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| s.status == super::StepStatus::InProgress)
    }
}
