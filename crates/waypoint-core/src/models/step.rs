//! Step model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{StepStatus, VerificationStatus};

/// One unit of work within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Caller-assigned number, unique within the plan
    pub step_number: u32,

    /// What the step does
    pub description: String,

    /// Capability names the caller expects to use (advisory)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_to_use: Vec<String>,

    /// How to tell the step succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criteria: Option<String>,

    /// Step numbers that must complete before this one starts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<u32>,

    /// Whether this step checks prior work instead of mutating anything
    #[serde(default)]
    pub is_verification: bool,

    /// Current status of the step
    #[serde(default)]
    pub status: StepStatus,

    /// What was accomplished, set on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Why the step failed or was skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,

    /// Outcome of the last automatic check; never changes `status`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_observations: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verification_issues: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<Timestamp>,
}

impl Step {
    /// Create a pending step with only the required fields set.
    pub fn new(step_number: u32, description: impl Into<String>) -> Self {
        Self {
            step_number,
            description: description.into(),
            tools_to_use: Vec::new(),
            success_criteria: None,
            depends_on: Vec::new(),
            is_verification: false,
            status: StepStatus::Pending,
            result: None,
            failure_reason: None,
            started_at: None,
            completed_at: None,
            verification_status: None,
            verification_observations: None,
            verification_issues: Vec::new(),
            verified_at: None,
        }
    }
}
