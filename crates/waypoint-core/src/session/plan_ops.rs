//! Plan operations for the SessionStore.

use jiff::Timestamp;
use log::{info, warn};

use super::{ProgressEvent, SessionStore};
use crate::{
    display::{CompletionReport, UpdateResult},
    error::{EngineError, Result},
    models::{CompletionStatus, Note, Plan, PlanProgress, Step, StepCommand},
    params::{CompletePlan, CreatePlan, UpdatePlan},
};

impl SessionStore {
    /// Creates a new plan, replacing any existing one.
    ///
    /// The retry ledger, notes, context and pending escalation belong to the
    /// replaced plan and are cleared with it. Every step starts Pending.
    ///
    /// # Errors
    ///
    /// * `EngineError::InvalidInput` - the plan fails validation; the
    ///   session is left untouched
    pub async fn create_plan(&self, params: &CreatePlan) -> Result<Plan> {
        params.validate()?;

        let steps = params
            .steps
            .iter()
            .map(|spec| {
                let mut step = Step::new(spec.step_number, spec.description.clone());
                step.tools_to_use = spec.tools_to_use.clone();
                step.success_criteria = spec.success_criteria.clone();
                step.depends_on = spec.depends_on.clone();
                step.is_verification = spec.is_verification;
                step
            })
            .collect();

        let plan = Plan {
            goal: params.goal.clone(),
            steps,
            verification_approach: params.verification_approach.clone(),
            rollback_strategy: params.rollback_strategy.clone(),
            estimated_tool_calls: params.estimated_tool_calls,
            completion_status: None,
            created_at: Timestamp::now(),
            completed_at: None,
        };

        {
            let mut session = self.state.lock().await;
            if session.plan.as_ref().is_some_and(Plan::is_active) {
                warn!("Replacing active plan with '{}'", plan.goal);
            }
            session.clear();
            session.plan = Some(plan.clone());
        }

        info!("Created plan '{}' with {} steps", plan.goal, plan.steps.len());
        self.emit(ProgressEvent::PlanCreated {
            goal: plan.goal.clone(),
            total_steps: plan.steps.len() as u32,
        });

        Ok(plan)
    }

    /// Applies one `update_plan` call.
    ///
    /// # Errors
    ///
    /// * `EngineError::InvalidInput` - unknown action or missing field
    /// * `EngineError::NoActivePlan` - no plan has been created
    /// * `EngineError::StepNotFound` - the step number is not in the plan
    /// * `EngineError::InvalidTransition` - the status change is not allowed
    /// * `EngineError::PrerequisiteIncomplete` - a dependency has not completed
    ///
    /// No state changes when an error is returned.
    pub async fn update_plan(&self, params: &UpdatePlan) -> Result<UpdateResult> {
        let command = StepCommand::try_from(params)?;

        let (step, change) = match command {
            StepCommand::Start { step_number } => {
                let step = self.start_step(step_number).await?;
                (Some(step), format!("Started step {step_number}"))
            }
            StepCommand::Complete {
                step_number,
                result,
            } => {
                let step = self.complete_step(step_number, result).await?;
                (Some(step), format!("Completed step {step_number}"))
            }
            StepCommand::Fail {
                step_number,
                reason,
            } => {
                let step = self.fail_step(step_number, reason).await?;
                (Some(step), format!("Marked step {step_number} failed"))
            }
            StepCommand::Skip {
                step_number,
                reason,
            } => {
                let step = self.skip_step(step_number, reason).await?;
                (Some(step), format!("Skipped step {step_number}"))
            }
            StepCommand::Add {
                description,
                after_step,
            } => {
                let step = self.add_step(description, after_step).await?;
                let change = format!("Added step {}", step.step_number);
                (Some(step), change)
            }
            StepCommand::Note { step_number, text } => {
                let note = self.add_note(step_number, text).await?;
                let step = match note.step_number {
                    Some(n) => self.plan().await.and_then(|p| p.step(n).cloned()),
                    None => None,
                };
                (step, "Recorded note".to_string())
            }
        };

        Ok(UpdateResult::new(step, self.progress().await?).with_change(change))
    }

    /// Marks the plan complete and returns its report.
    ///
    /// Repeating the call with identical arguments returns the cached report
    /// without recording anything again.
    ///
    /// # Errors
    ///
    /// * `EngineError::InvalidInput` - invalid status or empty summary
    /// * `EngineError::NoActivePlan` - no plan has been created
    /// * `EngineError::PlanAlreadyCompleted` - the plan was already completed
    ///   with different arguments, or cancelled
    pub async fn complete_plan(&self, params: &CompletePlan) -> Result<CompletionReport> {
        let status = params.validate()?;

        let report = {
            let mut session = self.state.lock().await;

            if let Some((previous, report)) = &session.completion {
                if previous == params {
                    return Ok(report.clone());
                }
                return Err(EngineError::PlanAlreadyCompleted {
                    status: report.status,
                });
            }

            let retries = session.retries.len();
            let plan = session.plan.as_mut().ok_or(EngineError::NoActivePlan)?;
            if let Some(existing) = plan.completion_status {
                return Err(EngineError::PlanAlreadyCompleted { status: existing });
            }

            let now = Timestamp::now();
            plan.completion_status = Some(status);
            plan.completed_at = Some(now);

            let progress = PlanProgress::from_plan(plan, retries);
            let report = CompletionReport::build(plan, status, params, progress, now);
            session.escalation = None;
            session.completion = Some((params.clone(), report.clone()));
            report
        };

        info!("Plan '{}' completed: {}", report.goal, status);
        self.emit(ProgressEvent::PlanCompleted { status });

        Ok(report)
    }

    /// Cancels the plan, leaving every step exactly as it is.
    ///
    /// Cancelling an already cancelled plan is a no-op.
    ///
    /// # Errors
    ///
    /// * `EngineError::NoActivePlan` - no plan has been created
    /// * `EngineError::PlanAlreadyCompleted` - the plan completed normally
    pub async fn cancel_plan(&self, reason: Option<&str>) -> Result<PlanProgress> {
        let progress = {
            let mut session = self.state.lock().await;
            let retries = session.retries.len();
            let plan = session.plan.as_mut().ok_or(EngineError::NoActivePlan)?;

            match plan.completion_status {
                Some(CompletionStatus::Cancelled) => {
                    return Ok(PlanProgress::from_plan(plan, retries));
                }
                Some(status) => return Err(EngineError::PlanAlreadyCompleted { status }),
                None => {}
            }

            plan.completion_status = Some(CompletionStatus::Cancelled);
            plan.completed_at = Some(Timestamp::now());
            let progress = PlanProgress::from_plan(plan, retries);

            session.escalation = None;
            if let Some(reason) = reason {
                session.notes.push(Note {
                    step_number: None,
                    text: format!("Cancelled: {reason}"),
                    created_at: Timestamp::now(),
                });
            }
            progress
        };

        info!("Plan cancelled: {}", reason.unwrap_or("no reason given"));
        self.emit(ProgressEvent::PlanCompleted {
            status: CompletionStatus::Cancelled,
        });

        Ok(progress)
    }

    /// Step counts and ledger size for the current plan.
    ///
    /// # Errors
    ///
    /// * `EngineError::NoActivePlan` - no plan has been created
    pub async fn progress(&self) -> Result<PlanProgress> {
        let session = self.state.lock().await;
        let plan = session.plan.as_ref().ok_or(EngineError::NoActivePlan)?;
        Ok(PlanProgress::from_plan(plan, session.retries.len()))
    }
}
