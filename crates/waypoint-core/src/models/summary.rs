//! Plan progress counts.

use serde::{Deserialize, Serialize};

use super::{CompletionStatus, Plan, StepStatus};

/// Step counts for a plan, available at any point of execution.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanProgress {
    pub total_steps: u32,
    pub completed_steps: u32,
    pub in_progress_steps: u32,
    pub failed_steps: u32,
    pub skipped_steps: u32,
    pub pending_steps: u32,
    /// Records in the retry ledger, across all steps
    pub retries: u32,
}

impl PlanProgress {
    /// Compute counts for a plan and the size of the retry ledger.
    pub fn from_plan(plan: &Plan, retries: usize) -> Self {
        let count = |status: StepStatus| {
            plan.steps.iter().filter(|s| s.status == status).count() as u32
        };

        Self {
            total_steps: plan.steps.len() as u32,
            completed_steps: count(StepStatus::Completed),
            in_progress_steps: count(StepStatus::InProgress),
            failed_steps: count(StepStatus::Failed),
            skipped_steps: count(StepStatus::Skipped),
            pending_steps: count(StepStatus::Pending),
            retries: retries as u32,
        }
    }

    /// Whether every step reached a terminal status.
    pub fn is_settled(&self) -> bool {
        self.pending_steps == 0 && self.in_progress_steps == 0
    }

    /// Completion status implied by the step outcomes.
    ///
    /// All steps completed is a success; some completed is a partial success;
    /// nothing completed is a failure.
    pub fn suggested_status(&self) -> CompletionStatus {
        if self.total_steps > 0 && self.completed_steps == self.total_steps {
            CompletionStatus::Success
        } else if self.completed_steps > 0 {
            CompletionStatus::PartialSuccess
        } else {
            CompletionStatus::Failed
        }
    }
}

impl From<&Plan> for PlanProgress {
    fn from(plan: &Plan) -> Self {
        Self::from_plan(plan, 0)
    }
}
