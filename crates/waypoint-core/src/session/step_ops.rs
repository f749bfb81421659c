//! Step operations, the retry ledger and execution context for the
//! SessionStore.

use jiff::Timestamp;
use log::debug;

use super::{ProgressEvent, Session, SessionStore};
use crate::{
    error::{EngineError, Result},
    escalation::Escalation,
    models::{Note, Plan, RetryRecord, Step, StepStatus, VerificationStatus},
};

/// The current plan, if it still accepts step work.
fn active_plan(session: &mut Session) -> Result<&mut Plan> {
    let plan = session.plan.as_mut().ok_or(EngineError::NoActivePlan)?;
    match plan.completion_status {
        Some(status) => Err(EngineError::PlanAlreadyCompleted { status }),
        None => Ok(plan),
    }
}

fn check_prerequisites(plan: &Plan, step: &Step) -> Result<()> {
    for prerequisite in &step.depends_on {
        let completed = plan
            .step(*prerequisite)
            .is_some_and(|s| s.status == StepStatus::Completed);
        if !completed {
            return Err(EngineError::PrerequisiteIncomplete {
                step_number: step.step_number,
                prerequisite: *prerequisite,
            });
        }
    }
    Ok(())
}

impl SessionStore {
    /// Pending → InProgress.
    ///
    /// # Errors
    ///
    /// * `EngineError::PrerequisiteIncomplete` - a `depends_on` step is not
    ///   completed
    pub async fn start_step(&self, step_number: u32) -> Result<Step> {
        self.transition(step_number, StepStatus::InProgress, |step| {
            step.started_at = Some(Timestamp::now());
        })
        .await
    }

    /// InProgress → Completed, storing the result.
    pub async fn complete_step(&self, step_number: u32, result: Option<String>) -> Result<Step> {
        self.transition(step_number, StepStatus::Completed, |step| {
            step.result = result;
            step.completed_at = Some(Timestamp::now());
        })
        .await
    }

    /// InProgress → Failed, storing the reason.
    ///
    /// Records the outcome only; recovery is the dispatcher's job.
    pub async fn fail_step(&self, step_number: u32, reason: Option<String>) -> Result<Step> {
        self.transition(step_number, StepStatus::Failed, |step| {
            step.failure_reason = reason;
            step.completed_at = Some(Timestamp::now());
        })
        .await
    }

    /// Any status → Skipped, storing the reason.
    pub async fn skip_step(&self, step_number: u32, reason: Option<String>) -> Result<Step> {
        self.transition(step_number, StepStatus::Skipped, |step| {
            step.failure_reason = reason;
            step.completed_at = Some(Timestamp::now());
        })
        .await
    }

    async fn transition(
        &self,
        step_number: u32,
        to: StepStatus,
        apply: impl FnOnce(&mut Step),
    ) -> Result<Step> {
        let updated = {
            let mut session = self.state.lock().await;
            let plan = active_plan(&mut session)?;

            let current = plan
                .step(step_number)
                .ok_or(EngineError::StepNotFound { step_number })?;
            if !current.status.can_transition_to(to) {
                return Err(EngineError::InvalidTransition {
                    step_number,
                    from: current.status,
                    to,
                });
            }
            if to == StepStatus::InProgress {
                check_prerequisites(plan, current)?;
            }

            let step = plan
                .step_mut(step_number)
                .ok_or(EngineError::StepNotFound { step_number })?;
            let from = step.status;
            step.status = to;
            apply(step);
            let updated = step.clone();

            if to.is_terminal() {
                if session.guided_step == Some(step_number) {
                    session.guided_step = None;
                }
                if session
                    .escalation
                    .as_ref()
                    .is_some_and(|e| e.step_number == step_number)
                {
                    session.escalation = None;
                }
            }

            debug!("Step {step_number}: {from} -> {to}");
            updated
        };

        self.emit(ProgressEvent::StepUpdated {
            step_number,
            status: to,
        });

        Ok(updated)
    }

    /// Inserts a new Pending step after `after_step`, or at the end.
    ///
    /// The new step is numbered one past the highest existing number;
    /// existing steps keep their numbers.
    pub async fn add_step(
        &self,
        description: impl Into<String>,
        after_step: Option<u32>,
    ) -> Result<Step> {
        let step = {
            let mut session = self.state.lock().await;
            let plan = active_plan(&mut session)?;

            let index = match after_step {
                Some(after) => {
                    plan.position_of(after)
                        .ok_or(EngineError::StepNotFound { step_number: after })?
                        + 1
                }
                None => plan.steps.len(),
            };

            let highest = plan.steps.iter().map(|s| s.step_number).max().unwrap_or(0);
            let number = highest.checked_add(1).ok_or_else(|| {
                EngineError::invalid_input("new_step").with_reason(format!(
                    "No step number above {highest} is available"
                ))
            })?;
            let step = Step::new(number, description);
            plan.steps.insert(index, step.clone());
            step
        };

        debug!("Added step {} at position after {:?}", step.step_number, after_step);
        self.emit(ProgressEvent::PlanModified {
            step_number: Some(step.step_number),
            change: format!("Added step {}", step.step_number),
        });

        Ok(step)
    }

    /// Appends a note to the session. Notes may be added to finished plans.
    pub async fn add_note(&self, step_number: Option<u32>, text: impl Into<String>) -> Result<Note> {
        let note = {
            let mut session = self.state.lock().await;
            let plan = session.plan.as_ref().ok_or(EngineError::NoActivePlan)?;
            if let Some(step_number) = step_number {
                if plan.step(step_number).is_none() {
                    return Err(EngineError::StepNotFound { step_number });
                }
            }

            let note = Note {
                step_number,
                text: text.into(),
                created_at: Timestamp::now(),
            };
            session.notes.push(note.clone());
            note
        };

        self.emit(ProgressEvent::PlanModified {
            step_number,
            change: "Recorded note".to_string(),
        });

        Ok(note)
    }

    /// Sets the orthogonal verification fields of a step without touching
    /// its status.
    pub async fn record_verification(
        &self,
        step_number: u32,
        status: VerificationStatus,
        observations: Option<String>,
        issues: Vec<String>,
    ) -> Result<Step> {
        let step = {
            let mut session = self.state.lock().await;
            let plan = session.plan.as_mut().ok_or(EngineError::NoActivePlan)?;
            let step = plan
                .step_mut(step_number)
                .ok_or(EngineError::StepNotFound { step_number })?;

            step.verification_status = Some(status);
            step.verification_observations = observations;
            step.verification_issues = issues;
            step.verified_at = Some(Timestamp::now());
            step.clone()
        };

        debug!("Step {step_number} verification: {status}");
        self.emit(ProgressEvent::StepUpdated {
            step_number,
            status: step.status,
        });

        Ok(step)
    }
}

/// Retry ledger.
impl SessionStore {
    /// Appends a failed attempt to the ledger.
    ///
    /// The first failure after human guidance for the step is marked
    /// `guided` and does not count against the retry budget.
    pub async fn record_retry(
        &self,
        step_number: u32,
        error: impl Into<String>,
        suggested_modification: Option<String>,
    ) -> Result<RetryRecord> {
        let mut session = self.state.lock().await;
        let plan = session.plan.as_ref().ok_or(EngineError::NoActivePlan)?;
        if plan.step(step_number).is_none() {
            return Err(EngineError::StepNotFound { step_number });
        }

        let previous = session
            .retries
            .iter()
            .filter(|r| r.step_number == step_number)
            .count() as u32;
        let guided = session.guided_step == Some(step_number);
        if guided {
            session.guided_step = None;
        }

        let record = RetryRecord {
            step_number,
            attempt: previous + 1,
            error: error.into(),
            suggested_modification,
            guided,
            timestamp: Timestamp::now(),
        };
        session.retries.push(record.clone());

        debug!(
            "Recorded attempt {} for step {}{}",
            record.attempt,
            step_number,
            if guided { " (guided)" } else { "" }
        );

        Ok(record)
    }

    /// Failed attempts for a step that count against the retry budget.
    pub async fn retry_count(&self, step_number: u32) -> u32 {
        self.state
            .lock()
            .await
            .retries
            .iter()
            .filter(|r| r.step_number == step_number && !r.guided)
            .count() as u32
    }

    /// Every ledger record for a step, guided ones included.
    pub async fn retry_records(&self, step_number: u32) -> Vec<RetryRecord> {
        self.state
            .lock()
            .await
            .retries
            .iter()
            .filter(|r| r.step_number == step_number)
            .cloned()
            .collect()
    }
}

/// Execution context and escalation state.
impl SessionStore {
    /// Appends feedback for the step planner, such as verification issues.
    pub async fn add_context(&self, text: impl Into<String>) {
        self.state.lock().await.context.push(text.into());
    }

    /// Answers the pending escalation with human guidance.
    ///
    /// Under one lock: takes the escalation, appends the guidance verbatim and
    /// grants the escalated step one attempt that does not consume retry
    /// budget. Returns `None` and changes nothing when no escalation is
    /// pending.
    pub async fn accept_guidance(&self, text: impl Into<String>) -> Option<Escalation> {
        let mut session = self.state.lock().await;
        let escalation = session.escalation.take()?;
        session.context.push(text.into());
        session.guided_step = Some(escalation.step_number);
        Some(escalation)
    }

    pub async fn context(&self) -> Vec<String> {
        self.state.lock().await.context.clone()
    }

    pub async fn set_escalation(&self, escalation: Escalation) {
        self.state.lock().await.escalation = Some(escalation);
    }

    pub async fn pending_escalation(&self) -> Option<Escalation> {
        self.state.lock().await.escalation.clone()
    }
}
