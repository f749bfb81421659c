//! Parameter structures for the planning call surface
//!
//! These structures are the shapes an external autonomous caller sends to the
//! engine: `create_plan`, `update_plan` and `complete_plan`. They carry no
//! interface-framework derives beyond serde; JSON schema generation is enabled
//! with the `schema` feature for front ends that need it (the MCP server).
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │   MCP Params    │    │  Core Params    │    │  Session Store  │
//! │ (schema derive) │───▶│ (validated)     │───▶│  (mutation)     │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! Validation happens here, before the store is locked, so a rejected call
//! never leaves partial state behind.

use std::collections::HashSet;

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    error::{EngineError, Result},
    models::CompletionStatus,
};

/// One step as supplied to `create_plan`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct StepSpec {
    /// Step number, unique within the plan
    pub step_number: u32,
    /// What the step does
    pub description: String,
    /// Capability names expected to be used (advisory)
    #[serde(default)]
    pub tools_to_use: Vec<String>,
    /// How to tell the step succeeded
    #[serde(default)]
    pub success_criteria: Option<String>,
    /// Step numbers that must complete first
    #[serde(default)]
    pub depends_on: Vec<u32>,
    /// Whether this step checks prior work rather than changing anything
    #[serde(default)]
    pub is_verification: bool,
}

impl StepSpec {
    /// Shorthand for a plain step with only a number and description.
    pub fn new(step_number: u32, description: impl Into<String>) -> Self {
        Self {
            step_number,
            description: description.into(),
            ..Default::default()
        }
    }

    /// Mark the step as a verification step.
    pub fn verification(mut self) -> Self {
        self.is_verification = true;
        self
    }

    /// Declare prerequisites for the step.
    pub fn depends_on(mut self, steps: impl IntoIterator<Item = u32>) -> Self {
        self.depends_on = steps.into_iter().collect();
        self
    }
}

/// Parameters for creating a new plan, replacing any active one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct CreatePlan {
    /// Goal of the plan (required)
    pub goal: String,
    /// Ordered steps
    pub steps: Vec<StepSpec>,
    /// How the outcome will be verified (advisory)
    #[serde(default)]
    pub verification_approach: Option<String>,
    /// Expected number of capability invocations (advisory)
    #[serde(default)]
    pub estimated_tool_calls: Option<u32>,
    /// How partial work would be undone (advisory)
    #[serde(default)]
    pub rollback_strategy: Option<String>,
}

impl CreatePlan {
    /// Validate the plan shape.
    ///
    /// # Errors
    ///
    /// * `EngineError::InvalidInput` - empty goal or description, duplicate
    ///   step number, or a `depends_on` entry naming an unknown step or the
    ///   step itself
    pub fn validate(&self) -> Result<()> {
        if self.goal.trim().is_empty() {
            return Err(EngineError::invalid_input("goal").with_reason("Goal must not be empty"));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.step_number) {
                return Err(EngineError::invalid_input("steps").with_reason(format!(
                    "Duplicate step_number {}. Step numbers must be unique within a plan",
                    step.step_number
                )));
            }
            if step.description.trim().is_empty() {
                return Err(EngineError::invalid_input("steps").with_reason(format!(
                    "Step {} has an empty description",
                    step.step_number
                )));
            }
        }

        for step in &self.steps {
            for prerequisite in &step.depends_on {
                if *prerequisite == step.step_number {
                    return Err(EngineError::invalid_input("depends_on").with_reason(format!(
                        "Step {} cannot depend on itself",
                        step.step_number
                    )));
                }
                if !seen.contains(prerequisite) {
                    return Err(EngineError::invalid_input("depends_on").with_reason(format!(
                        "Step {} depends on step {}, which is not in the plan",
                        step.step_number, prerequisite
                    )));
                }
            }
        }

        Ok(())
    }
}

/// A step added to a running plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct NewStep {
    /// What the step does
    pub description: String,
    /// Insert after this step; appended at the end when omitted
    #[serde(default)]
    pub after_step: Option<u32>,
}

/// Parameters for `update_plan`.
///
/// `action` is one of `start_step`, `complete_step`, `fail_step`,
/// `skip_step`, `add_step` or `note`; which other fields are required
/// depends on the action.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct UpdatePlan {
    /// The update to apply
    pub action: String,
    /// Target step (required for start/complete/fail/skip)
    #[serde(default)]
    pub step_number: Option<u32>,
    /// What was accomplished (complete_step)
    #[serde(default)]
    pub result: Option<String>,
    /// Why the step failed or was skipped (fail_step, skip_step)
    #[serde(default)]
    pub reason: Option<String>,
    /// Step to insert (add_step)
    #[serde(default)]
    pub new_step: Option<NewStep>,
    /// Text to record (note)
    #[serde(default)]
    pub note: Option<String>,
}

impl UpdatePlan {
    /// Build an update for one of the step-targeting actions.
    pub fn for_step(action: &str, step_number: u32) -> Self {
        Self {
            action: action.to_string(),
            step_number: Some(step_number),
            ..Default::default()
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Parameters for `complete_plan`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct CompletePlan {
    /// One of 'success', 'partial_success' or 'failed'
    pub status: String,
    /// What the plan achieved
    pub summary: String,
    /// Caller-reported counts; derived from the plan when omitted
    #[serde(default)]
    pub steps_completed: Option<u32>,
    #[serde(default)]
    pub steps_failed: Option<u32>,
    #[serde(default)]
    pub steps_skipped: Option<u32>,
    #[serde(default)]
    pub issues_encountered: Vec<String>,
    /// Identifiers of entities the plan created
    #[serde(default)]
    pub elements_created: Vec<i64>,
    /// Identifiers of entities the plan modified
    #[serde(default)]
    pub elements_modified: Vec<i64>,
    #[serde(default)]
    pub recommendations: Option<String>,
}

impl CompletePlan {
    /// Parse and validate the reported status.
    pub fn validate(&self) -> Result<CompletionStatus> {
        let status = self
            .status
            .parse::<CompletionStatus>()
            .map_err(|reason| EngineError::invalid_input("status").with_reason(reason))?;

        if self.summary.trim().is_empty() {
            return Err(EngineError::invalid_input("summary")
                .with_reason("A summary of what the plan achieved is required"));
        }

        Ok(status)
    }
}
