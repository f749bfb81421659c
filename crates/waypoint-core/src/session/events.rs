//! Progress notifications published by the session store.

use serde::{Deserialize, Serialize};

use crate::models::{CompletionStatus, StepStatus};

/// A change observers may want to display.
///
/// Events carry identifiers only; observers that need detail take a
/// snapshot from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    PlanCreated {
        goal: String,
        total_steps: u32,
    },
    StepUpdated {
        step_number: u32,
        status: StepStatus,
    },
    /// Steps were added or notes recorded
    PlanModified {
        step_number: Option<u32>,
        change: String,
    },
    PlanCompleted {
        status: CompletionStatus,
    },
}
