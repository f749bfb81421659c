//! Escalation messages and interpretation of the human reply.
//!
//! When recovery gives up, execution pauses and a fixed-format message is
//! shown to a human. Their free-form reply decides how execution resumes:
//!
//! | Reply mentions | Decision |
//! |---|---|
//! | "skip" or "continue" | mark the step skipped, move to the next pending step |
//! | "abort", "stop" or "cancel" | cancel the plan |
//! | anything else | treat the text as guidance and retry the same step |
//!
//! Matching is case-insensitive substring containment, checked in that order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A pause in autonomous execution that needs a human decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Escalation {
    pub step_number: u32,
    /// Retries consumed for the step when recovery gave up, capped at the
    /// configured budget
    pub retry_count: u32,
    /// Raw error text of the last failure
    pub error: String,
}

impl Escalation {
    pub fn new(step_number: u32, retry_count: u32, error: impl Into<String>) -> Self {
        Self {
            step_number,
            retry_count,
            error: error.into(),
        }
    }

    /// The human-facing message. Identical inputs always give identical text.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Execution paused at step {}", self.step_number)?;
        writeln!(f)?;
        writeln!(
            f,
            "Step {} could not be completed automatically.",
            self.step_number
        )?;
        writeln!(f)?;
        writeln!(f, "- Retries: {}", self.retry_count)?;
        writeln!(f, "- Error: {}", self.error)?;
        writeln!(f)?;
        writeln!(f, "How would you like to proceed?")?;
        writeln!(f)?;
        writeln!(
            f,
            "1. Provide guidance: describe what to change and the step will be attempted again"
        )?;
        writeln!(
            f,
            "2. Skip step: reply \"skip\" to mark step {} skipped and continue",
            self.step_number
        )?;
        writeln!(f, "3. Abort plan: reply \"abort\" to cancel the remaining steps")
    }
}

/// How to resume after an escalation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeDecision {
    Skip,
    Abort,
    /// Retry the same step with this text added to the execution context
    Guidance(String),
}

/// Interpret a free-form human reply to an escalation.
///
/// # Examples
///
/// ```rust
/// use waypoint_core::escalation::{interpret_reply, ResumeDecision};
///
/// assert_eq!(interpret_reply("please just skip it"), ResumeDecision::Skip);
/// assert_eq!(interpret_reply("STOP everything"), ResumeDecision::Abort);
/// assert_eq!(
///     interpret_reply("use Level 2 instead"),
///     ResumeDecision::Guidance("use Level 2 instead".to_string())
/// );
/// ```
pub fn interpret_reply(reply: &str) -> ResumeDecision {
    let normalized = reply.to_lowercase();

    if ["skip", "continue"].iter().any(|k| normalized.contains(k)) {
        ResumeDecision::Skip
    } else if ["abort", "stop", "cancel"].iter().any(|k| normalized.contains(k)) {
        ResumeDecision::Abort
    } else {
        ResumeDecision::Guidance(reply.to_string())
    }
}
