//! The report produced by `complete_plan`.

use std::{collections::HashSet, fmt};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::datetime::UtcDateTime;
use crate::{
    models::{CompletionStatus, Plan, PlanProgress},
    params::CompletePlan,
};

/// Final report for a completed plan.
///
/// Built once when the plan completes and cached by the session, so repeated
/// identical `complete_plan` calls render byte-identical text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionReport {
    pub goal: String,
    pub status: CompletionStatus,
    pub summary: String,
    pub total_steps: u32,
    pub steps_completed: u32,
    pub steps_failed: u32,
    pub steps_skipped: u32,
    pub retries: u32,
    pub issues_encountered: Vec<String>,
    /// Created element ids, deduplicated in first-seen order
    pub elements_created: Vec<i64>,
    /// Modified element ids, deduplicated in first-seen order
    pub elements_modified: Vec<i64>,
    pub recommendations: Option<String>,
    pub completed_at: Timestamp,
}

impl CompletionReport {
    /// Build the report from the caller's parameters and the plan state.
    ///
    /// Step counts the caller omits are taken from the plan.
    pub fn build(
        plan: &Plan,
        status: CompletionStatus,
        params: &CompletePlan,
        progress: PlanProgress,
        completed_at: Timestamp,
    ) -> Self {
        Self {
            goal: plan.goal.clone(),
            status,
            summary: params.summary.clone(),
            total_steps: progress.total_steps,
            steps_completed: params.steps_completed.unwrap_or(progress.completed_steps),
            steps_failed: params.steps_failed.unwrap_or(progress.failed_steps),
            steps_skipped: params.steps_skipped.unwrap_or(progress.skipped_steps),
            retries: progress.retries,
            issues_encountered: params.issues_encountered.clone(),
            elements_created: dedup(&params.elements_created),
            elements_modified: dedup(&params.elements_modified),
            recommendations: params.recommendations.clone(),
            completed_at,
        }
    }
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for CompletionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Plan {}: {}", self.status.label(), self.goal)?;
        writeln!(f)?;
        writeln!(f, "{}", self.summary)?;
        writeln!(f)?;

        writeln!(f, "## Steps")?;
        writeln!(f)?;
        writeln!(f, "- Completed: {}/{}", self.steps_completed, self.total_steps)?;
        writeln!(f, "- Failed: {}", self.steps_failed)?;
        writeln!(f, "- Skipped: {}", self.steps_skipped)?;
        writeln!(f, "- Retries: {}", self.retries)?;
        writeln!(f, "- Finished: {}", UtcDateTime(&self.completed_at))?;

        if !self.elements_created.is_empty() || !self.elements_modified.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Elements")?;
            writeln!(f)?;
            if !self.elements_created.is_empty() {
                writeln!(
                    f,
                    "- Created ({}): {}",
                    self.elements_created.len(),
                    join_ids(&self.elements_created)
                )?;
            }
            if !self.elements_modified.is_empty() {
                writeln!(
                    f,
                    "- Modified ({}): {}",
                    self.elements_modified.len(),
                    join_ids(&self.elements_modified)
                )?;
            }
        }

        if !self.issues_encountered.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Issues encountered")?;
            writeln!(f)?;
            for issue in &self.issues_encountered {
                writeln!(f, "- {issue}")?;
            }
        }

        if let Some(recommendations) = &self.recommendations {
            writeln!(f)?;
            writeln!(f, "## Recommendations")?;
            writeln!(f)?;
            writeln!(f, "{recommendations}")?;
        }

        Ok(())
    }
}
