//! Display implementations for domain models.
//!
//! Kept apart from the model definitions so the models stay plain data. All
//! output is markdown, rendered by the CLI or returned verbatim to MCP
//! callers.

use std::fmt;

use super::datetime::LocalDateTime;
use crate::{
    models::{CompletionStatus, Note, Plan, PlanProgress, Step, StepStatus, VerificationStatus},
    session::SessionSnapshot,
};

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = PlanProgress::from(self);

        writeln!(f, "# {}", self.goal)?;
        writeln!(f)?;

        let status = self
            .completion_status
            .map(|s| s.as_str())
            .unwrap_or("active");
        writeln!(f, "- Status: {status}")?;
        writeln!(
            f,
            "- Progress: {}/{} completed",
            progress.completed_steps, progress.total_steps
        )?;
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;
        if let Some(completed_at) = &self.completed_at {
            writeln!(f, "- Finished: {}", LocalDateTime(completed_at))?;
        }
        if let Some(calls) = self.estimated_tool_calls {
            writeln!(f, "- Estimated tool calls: {calls}")?;
        }
        if let Some(approach) = &self.verification_approach {
            writeln!(f, "- Verification approach: {approach}")?;
        }
        if let Some(rollback) = &self.rollback_strategy {
            writeln!(f, "- Rollback strategy: {rollback}")?;
        }

        if self.steps.is_empty() {
            writeln!(f, "\nNo steps in this plan.")?;
            return Ok(());
        }

        writeln!(f, "\n## Steps")?;
        writeln!(f)?;
        for step in &self.steps {
            write!(f, "{step}")?;
        }

        Ok(())
    }
}

impl Step {
    fn fmt_metadata(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;

        if self.is_verification {
            writeln!(f, "- Verification step")?;
            wrote = true;
        }
        if !self.tools_to_use.is_empty() {
            writeln!(f, "- Tools: {}", self.tools_to_use.join(", "))?;
            wrote = true;
        }
        if !self.depends_on.is_empty() {
            let deps: Vec<String> = self.depends_on.iter().map(u32::to_string).collect();
            writeln!(f, "- Depends on: {}", deps.join(", "))?;
            wrote = true;
        }
        if let Some(verification) = self.verification_status {
            writeln!(f, "- Check: {verification}")?;
            wrote = true;
        }

        if wrote {
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "### {}. {} ({})",
            self.step_number,
            self.description,
            self.status.with_icon()
        )?;
        writeln!(f)?;

        self.fmt_metadata(f)?;

        if let Some(criteria) = &self.success_criteria {
            writeln!(f, "#### Success criteria")?;
            writeln!(f)?;
            writeln!(f, "{criteria}")?;
            writeln!(f)?;
        }

        match (self.status, &self.result, &self.failure_reason) {
            (StepStatus::Completed, Some(result), _) => {
                writeln!(f, "#### Result")?;
                writeln!(f)?;
                writeln!(f, "{result}")?;
                writeln!(f)?;
            }
            (StepStatus::Failed | StepStatus::Skipped, _, Some(reason)) => {
                writeln!(f, "#### Reason")?;
                writeln!(f)?;
                writeln!(f, "{reason}")?;
                writeln!(f)?;
            }
            _ => {}
        }

        if let Some(observations) = &self.verification_observations {
            writeln!(f, "#### Observations")?;
            writeln!(f)?;
            writeln!(f, "{observations}")?;
            writeln!(f)?;
        }

        if !self.verification_issues.is_empty() {
            writeln!(f, "#### Issues")?;
            writeln!(f)?;
            for issue in &self.verification_issues {
                writeln!(f, "- {issue}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step_number {
            Some(step_number) => writeln!(f, "- Step {step_number}: {}", self.text),
            None => writeln!(f, "- {}", self.text),
        }
    }
}

impl fmt::Display for PlanProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- Completed: {}/{}", self.completed_steps, self.total_steps)?;
        writeln!(f, "- In progress: {}", self.in_progress_steps)?;
        writeln!(f, "- Failed: {}", self.failed_steps)?;
        writeln!(f, "- Skipped: {}", self.skipped_steps)?;
        writeln!(f, "- Pending: {}", self.pending_steps)?;
        writeln!(f, "- Retries: {}", self.retries)
    }
}

/// Full session view: the plan, its progress, notes and any pending
/// escalation.
impl fmt::Display for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(plan) = &self.plan else {
            return writeln!(f, "No active plan.");
        };

        write!(f, "{plan}")?;
        writeln!(f)?;
        writeln!(f, "## Progress")?;
        writeln!(f)?;
        write!(f, "{}", PlanProgress::from_plan(plan, self.retries.len()))?;

        if !self.notes.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Notes")?;
            writeln!(f)?;
            for note in &self.notes {
                write!(f, "{note}")?;
            }
        }

        if let Some(escalation) = &self.escalation {
            writeln!(f)?;
            write!(f, "{escalation}")?;
        }
        Ok(())
    }
}
