//! Result wrapper types for displaying planning call outcomes.

use std::fmt;

use crate::models::{Plan, PlanProgress, Step};

/// Wrapper type for displaying the result of create operations.
///
/// # Examples
///
/// ```rust
/// use jiff::Timestamp;
/// use waypoint_core::{
///     display::CreateResult,
///     models::{Plan, Step},
/// };
///
/// let plan = Plan {
///     goal: "Create 3 levels".to_string(),
///     steps: vec![Step::new(1, "create level A")],
///     verification_approach: None,
///     rollback_strategy: None,
///     estimated_tool_calls: None,
///     completion_status: None,
///     created_at: Timestamp::now(),
///     completed_at: None,
/// };
///
/// let output = CreateResult::new(plan).to_string();
/// assert!(output.starts_with("Created plan 'Create 3 levels' with 1 step"));
/// ```
pub struct CreateResult<T> {
    pub resource: T,
}

impl<T> CreateResult<T> {
    /// Create a new CreateResult wrapper.
    pub fn new(resource: T) -> Self {
        Self { resource }
    }
}

impl fmt::Display for CreateResult<Plan> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.resource.steps.len();
        writeln!(
            f,
            "Created plan '{}' with {} step{}",
            self.resource.goal,
            count,
            if count == 1 { "" } else { "s" }
        )?;
        writeln!(f)?;
        write!(f, "{}", self.resource)
    }
}

/// Outcome of an `update_plan` call.
///
/// Carries the affected step (absent for plan-level notes), the changes
/// applied, and plan progress after the update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    pub step: Option<Step>,
    pub changes: Vec<String>,
    pub progress: PlanProgress,
}

impl UpdateResult {
    pub fn new(step: Option<Step>, progress: PlanProgress) -> Self {
        Self {
            step,
            changes: Vec::new(),
            progress,
        }
    }

    pub fn with_change(mut self, change: impl Into<String>) -> Self {
        self.changes.push(change.into());
        self
    }
}

impl fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.step {
            Some(step) => writeln!(f, "Updated step {}", step.step_number)?,
            None => writeln!(f, "Updated plan")?,
        }

        if !self.changes.is_empty() {
            writeln!(f)?;
            writeln!(f, "Changes made:")?;
            for change in &self.changes {
                writeln!(f, "- {change}")?;
            }
        }

        writeln!(f)?;
        writeln!(
            f,
            "Progress: {}/{} completed, {} failed, {} skipped",
            self.progress.completed_steps,
            self.progress.total_steps,
            self.progress.failed_steps,
            self.progress.skipped_steps
        )?;

        if let Some(step) = &self.step {
            writeln!(f)?;
            write!(f, "{step}")?;
        }

        Ok(())
    }
}
