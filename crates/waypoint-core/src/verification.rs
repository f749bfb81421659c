//! Automatic outcome verification.
//!
//! After a step's batch of actions, [`VerificationTrigger::should_verify`]
//! decides whether to ask for an outcome check. The check result is turned
//! into a [`VerificationStatus`] and a next action by
//! [`classify_verification`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    config::{EngineConfig, VerificationStrictness},
    models::{Step, VerificationStatus},
};

/// Outcome of one dispatched action within a step's batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub tool: String,
    pub mutating: bool,
    pub succeeded: bool,
    /// Entity ids the action reported touching
    pub affected: Vec<i64>,
}

impl BatchEntry {
    /// Entry for a successful action, reading affected ids from its payload.
    ///
    /// Recognizes `element_id` and `element_ids` fields.
    pub fn succeeded(tool: impl Into<String>, mutating: bool, payload: &Value) -> Self {
        let mut affected = Vec::new();
        if let Some(id) = payload.get("element_id").and_then(Value::as_i64) {
            affected.push(id);
        }
        if let Some(ids) = payload.get("element_ids").and_then(Value::as_array) {
            affected.extend(ids.iter().filter_map(Value::as_i64));
        }

        Self {
            tool: tool.into(),
            mutating,
            succeeded: true,
            affected,
        }
    }
}

/// What to do after a verification check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationAction {
    Proceed,
    /// The check reported nothing conclusive yet
    WaitForAnalysis,
    Retry,
    EscalateToUser,
}

/// Internal instruction to run an outcome check. Never shown to a human.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationDirective {
    pub step_number: u32,
    pub tools: Vec<String>,
    pub affected: Vec<i64>,
    pub check_capability: String,
    pub strictness: VerificationStrictness,
}

impl VerificationDirective {
    fn instruction(&self) -> &'static str {
        match self.strictness {
            VerificationStrictness::Minimal => {
                "Confirm the affected elements exist."
            }
            VerificationStrictness::Standard => {
                "Confirm the affected elements exist and match the step's success criteria."
            }
            VerificationStrictness::Strict => {
                "Confirm the affected elements exist, match the step's success criteria, and \
                 report any unexpected side effects on other elements."
            }
        }
    }

    /// Input for the check capability.
    pub fn to_input(&self) -> Value {
        json!({
            "step_number": self.step_number,
            "tools": self.tools,
            "affected": self.affected,
            "instruction": self.instruction(),
        })
    }
}

impl fmt::Display for VerificationDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[verification] step {}", self.step_number)?;
        writeln!(f, "- Tools run: {}", self.tools.join(", "))?;
        if !self.affected.is_empty() {
            let ids: Vec<String> = self.affected.iter().map(i64::to_string).collect();
            writeln!(f, "- Affected: {}", ids.join(", "))?;
        }
        writeln!(
            f,
            "Call {} and report approved, issues and observations. {}",
            self.check_capability,
            self.instruction()
        )
    }
}

/// Decides when automatic verification runs.
#[derive(Debug, Clone)]
pub struct VerificationTrigger {
    autonomous_mode: bool,
    auto_verification: bool,
    strictness: VerificationStrictness,
    check_capability: String,
}

impl VerificationTrigger {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            autonomous_mode: config.autonomous_mode,
            auto_verification: config.auto_verification,
            strictness: config.verification_strictness,
            check_capability: config.verification_capability.clone(),
        }
    }

    /// Whether a finished batch warrants an outcome check.
    ///
    /// Requires autonomous mode and auto-verification, at least one
    /// successful mutating action, and a step that is not itself a
    /// verification step.
    pub fn should_verify(&self, batch: &[BatchEntry], step: &Step) -> bool {
        self.autonomous_mode
            && self.auto_verification
            && !step.is_verification
            && batch.iter().any(|entry| entry.mutating && entry.succeeded)
    }

    /// Directive covering the successful mutating actions of the batch.
    pub fn directive(&self, batch: &[BatchEntry], step: &Step) -> VerificationDirective {
        let mutated = batch.iter().filter(|e| e.mutating && e.succeeded);

        let mut tools: Vec<String> = Vec::new();
        let mut affected = Vec::new();
        for entry in mutated {
            if !tools.contains(&entry.tool) {
                tools.push(entry.tool.clone());
            }
            affected.extend(&entry.affected);
        }

        VerificationDirective {
            step_number: step.step_number,
            tools,
            affected,
            check_capability: self.check_capability.clone(),
            strictness: self.strictness,
        }
    }
}

/// Classify a check result.
///
/// | Result | Status | Action |
/// |---|---|---|
/// | approved | Passed | Proceed |
/// | no issue text | Pending | WaitForAnalysis |
/// | retries ≥ max | Failed | EscalateToUser |
/// | otherwise | Issues | Retry |
///
/// # Examples
///
/// ```rust
/// use waypoint_core::{
///     models::VerificationStatus,
///     verification::{classify_verification, VerificationAction},
/// };
///
/// assert_eq!(
///     classify_verification(false, Some("wall is 10mm short"), 0, 2),
///     (VerificationStatus::Issues, VerificationAction::Retry)
/// );
/// ```
pub fn classify_verification(
    approved: bool,
    issues: Option<&str>,
    retry_attempts: u32,
    max_retries: u32,
) -> (VerificationStatus, VerificationAction) {
    let has_issues = issues.is_some_and(|text| !text.trim().is_empty());

    if approved {
        (VerificationStatus::Passed, VerificationAction::Proceed)
    } else if !has_issues {
        (VerificationStatus::Pending, VerificationAction::WaitForAnalysis)
    } else if retry_attempts >= max_retries {
        (VerificationStatus::Failed, VerificationAction::EscalateToUser)
    } else {
        (VerificationStatus::Issues, VerificationAction::Retry)
    }
}

/// Assessment returned by the check capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VerificationReport {
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub issues: Option<String>,
    #[serde(default)]
    pub observations: Option<String>,
}

impl VerificationReport {
    /// Read a report from a check payload. Unrecognized payloads read as
    /// unapproved with no issues, which classifies as inconclusive.
    pub fn from_payload(payload: &Value) -> Self {
        match serde_json::from_value(payload.clone()) {
            Ok(report) => report,
            Err(e) => {
                log::debug!("Unrecognized verification payload: {e}");
                Self::default()
            }
        }
    }

    /// Issue text split into one entry per non-empty line.
    pub fn issue_list(&self) -> Vec<String> {
        self.issues
            .as_deref()
            .unwrap_or_default()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}
