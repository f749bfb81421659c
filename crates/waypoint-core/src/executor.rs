//! The execution loop.
//!
//! [`Executor::run`] drives the current plan one step at a time: it asks the
//! [`StepPlanner`] for the step's actions, dispatches them in order, runs an
//! outcome check when the [`VerificationTrigger`] asks for one, and completes
//! the step. The loop stops when every step is settled, when recovery
//! escalates, or when cancellation fires.
//!
//! After an escalation, [`Executor::resume`] takes the human's reply:
//! skipping moves on to the next pending step, aborting cancels the plan,
//! and anything else is added to the execution context as guidance before
//! the same step is attempted again.
//!
//! Steps run sequentially in plan order. A pending step runs once all of its
//! `depends_on` steps are completed; a step whose prerequisites failed or
//! were skipped is skipped in turn.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    dispatch::{ActionRequest, DispatchOutcome, Dispatcher},
    error::{EngineError, Result},
    escalation::{interpret_reply, Escalation, ResumeDecision},
    models::{CompletionStatus, Plan, PlanProgress, Step, StepStatus},
    session::SessionStore,
    verification::{
        classify_verification, BatchEntry, VerificationAction, VerificationReport,
        VerificationTrigger,
    },
};

/// Turns a step into capability requests.
///
/// `context` holds human guidance and verification feedback, oldest first.
#[async_trait]
pub trait StepPlanner: Send + Sync {
    async fn actions_for(&self, step: &Step, context: &[String]) -> Vec<ActionRequest>;
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// No step is left to run
    Finished(PlanProgress),
    /// Waiting for a human reply
    Escalated(Escalation),
    Cancelled(PlanProgress),
}

enum NextStep {
    Run(Step),
    Blocked { step_number: u32, reason: String },
    Done,
}

enum StepRun {
    Settled,
    /// Verification asked for another pass over the same step
    Again,
    Escalated(Escalation),
    Cancelled,
}

fn next_step(plan: &Plan) -> NextStep {
    if let Some(step) = plan.current_step() {
        return NextStep::Run(step.clone());
    }

    let pending: Vec<&Step> = plan
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Pending)
        .collect();

    for step in &pending {
        for prerequisite in &step.depends_on {
            let status = plan.step(*prerequisite).map(|s| s.status);
            if matches!(
                status,
                None | Some(StepStatus::Failed) | Some(StepStatus::Skipped)
            ) {
                return NextStep::Blocked {
                    step_number: step.step_number,
                    reason: format!("Prerequisite step {prerequisite} did not complete"),
                };
            }
        }
    }

    let runnable = pending.iter().find(|step| {
        step.depends_on.iter().all(|p| {
            plan.step(*p)
                .is_some_and(|s| s.status == StepStatus::Completed)
        })
    });

    match (runnable, pending.first()) {
        (Some(step), _) => NextStep::Run((*step).clone()),
        (None, Some(step)) => NextStep::Blocked {
            step_number: step.step_number,
            reason: "Prerequisites form a cycle and can never complete".to_string(),
        },
        (None, None) => NextStep::Done,
    }
}

fn summarize(batch: &[BatchEntry]) -> String {
    if batch.is_empty() {
        return "No actions required".to_string();
    }

    let tools: Vec<&str> = batch.iter().map(|e| e.tool.as_str()).collect();
    let affected: Vec<String> = batch
        .iter()
        .flat_map(|e| e.affected.iter().map(i64::to_string))
        .collect();

    if affected.is_empty() {
        format!("Ran {}", tools.join(", "))
    } else {
        format!("Ran {} (affected: {})", tools.join(", "), affected.join(", "))
    }
}

/// Drives a plan to completion through a [`Dispatcher`].
pub struct Executor {
    store: SessionStore,
    dispatcher: Dispatcher,
    planner: Arc<dyn StepPlanner>,
    trigger: VerificationTrigger,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(dispatcher: Dispatcher, planner: Arc<dyn StepPlanner>) -> Self {
        let store = dispatcher.store().clone();
        let trigger = VerificationTrigger::new(store.config());
        Self {
            store,
            dispatcher,
            planner,
            trigger,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until the plan settles, escalates or is cancelled.
    ///
    /// Returns the pending escalation unchanged if one is already waiting
    /// for a reply.
    ///
    /// # Errors
    ///
    /// * `EngineError::NoActivePlan` - no plan has been created
    pub async fn run(&self) -> Result<LoopOutcome> {
        if let Some(escalation) = self.store.pending_escalation().await {
            return Ok(LoopOutcome::Escalated(escalation));
        }
        self.drive().await
    }

    /// Resume after an escalation using the human's free-form reply.
    ///
    /// # Errors
    ///
    /// * `EngineError::InvalidInput` - no escalation is waiting for a reply
    pub async fn resume(&self, reply: &str) -> Result<LoopOutcome> {
        let escalation = self.store.pending_escalation().await.ok_or_else(|| {
            EngineError::invalid_input("reply").with_reason("No escalation is waiting for a reply")
        })?;
        let step_number = escalation.step_number;

        match interpret_reply(reply) {
            ResumeDecision::Skip => {
                info!("Step {step_number}: skipped on request");
                self.store
                    .skip_step(
                        step_number,
                        Some(format!("Skipped on request after: {}", escalation.error)),
                    )
                    .await?;
            }
            ResumeDecision::Abort => {
                info!("Plan aborted on request at step {step_number}");
                let progress = self.store.cancel_plan(Some("aborted on request")).await?;
                return Ok(LoopOutcome::Cancelled(progress));
            }
            ResumeDecision::Guidance(text) => {
                info!("Step {step_number}: retrying with guidance");
                self.store.accept_guidance(text).await.ok_or_else(|| {
                    EngineError::invalid_input("reply")
                        .with_reason("The escalation was already answered")
                })?;
            }
        }

        self.drive().await
    }

    async fn drive(&self) -> Result<LoopOutcome> {
        loop {
            let plan = self.store.plan().await.ok_or(EngineError::NoActivePlan)?;
            match plan.completion_status {
                Some(CompletionStatus::Cancelled) => {
                    return Ok(LoopOutcome::Cancelled(self.store.progress().await?));
                }
                Some(_) => return Ok(LoopOutcome::Finished(self.store.progress().await?)),
                None => {}
            }

            if self.cancel.is_cancelled() {
                let progress = self.store.cancel_plan(Some("cancellation requested")).await?;
                return Ok(LoopOutcome::Cancelled(progress));
            }

            let step = match next_step(&plan) {
                NextStep::Run(step) => step,
                NextStep::Blocked {
                    step_number,
                    reason,
                } => {
                    info!("Step {step_number}: skipped, {reason}");
                    self.store.skip_step(step_number, Some(reason)).await?;
                    continue;
                }
                NextStep::Done => {
                    let progress = self.store.progress().await?;
                    info!(
                        "Plan '{}' settled: {}/{} steps completed",
                        plan.goal, progress.completed_steps, progress.total_steps
                    );
                    return Ok(LoopOutcome::Finished(progress));
                }
            };

            let step = if step.status == StepStatus::Pending {
                self.store.start_step(step.step_number).await?
            } else {
                step
            };

            match self.run_step(&step).await? {
                StepRun::Settled | StepRun::Again => {}
                StepRun::Escalated(escalation) => {
                    warn!("Execution paused at step {}", escalation.step_number);
                    return Ok(LoopOutcome::Escalated(escalation));
                }
                StepRun::Cancelled => {
                    return Ok(LoopOutcome::Cancelled(self.store.progress().await?));
                }
            }
        }
    }

    async fn run_step(&self, step: &Step) -> Result<StepRun> {
        let context = self.store.context().await;
        let actions = self.planner.actions_for(step, &context).await;
        debug!("Step {}: {} actions", step.step_number, actions.len());

        let mut batch = Vec::with_capacity(actions.len());
        for mut request in actions {
            request.step_number = step.step_number;
            let tool = request.action.clone();
            let mutating = request.mutating;

            match self.dispatcher.dispatch(request, &self.cancel).await? {
                DispatchOutcome::Completed { payload, .. } => {
                    batch.push(BatchEntry::succeeded(tool, mutating, &payload));
                }
                DispatchOutcome::Skipped { .. } => return Ok(StepRun::Settled),
                DispatchOutcome::NeedsHuman { escalation, .. } => {
                    return Ok(StepRun::Escalated(escalation));
                }
                DispatchOutcome::Cancelled => return Ok(StepRun::Cancelled),
            }
        }

        if self.trigger.should_verify(&batch, step) {
            if let Some(run) = self.verify(step, &batch).await? {
                return Ok(run);
            }
        }

        self.store
            .complete_step(step.step_number, Some(summarize(&batch)))
            .await?;
        Ok(StepRun::Settled)
    }

    /// Run the outcome check. `None` means the step may complete.
    async fn verify(&self, step: &Step, batch: &[BatchEntry]) -> Result<Option<StepRun>> {
        let directive = self.trigger.directive(batch, step);
        debug!("{directive}");

        let request = ActionRequest::new(
            step.step_number,
            directive.check_capability.clone(),
            directive.to_input(),
        );
        let payload = match self.dispatcher.dispatch(request, &self.cancel).await? {
            DispatchOutcome::Completed { payload, .. } => payload,
            DispatchOutcome::Skipped { .. } => return Ok(Some(StepRun::Settled)),
            DispatchOutcome::NeedsHuman { escalation, .. } => {
                return Ok(Some(StepRun::Escalated(escalation)));
            }
            DispatchOutcome::Cancelled => return Ok(Some(StepRun::Cancelled)),
        };

        let report = VerificationReport::from_payload(&payload);
        let attempts = self.store.retry_count(step.step_number).await;
        let (status, action) = classify_verification(
            report.approved,
            report.issues.as_deref(),
            attempts,
            self.store.config().max_retries,
        );
        self.store
            .record_verification(
                step.step_number,
                status,
                report.observations.clone(),
                report.issue_list(),
            )
            .await?;
        info!("Step {}: verification {status}", step.step_number);

        let issues = report.issues.unwrap_or_default();
        match action {
            VerificationAction::Proceed | VerificationAction::WaitForAnalysis => Ok(None),
            VerificationAction::Retry => {
                self.store
                    .record_retry(
                        step.step_number,
                        format!("Verification issues: {issues}"),
                        Some("Address the reported issues".to_string()),
                    )
                    .await?;
                self.store
                    .add_context(format!(
                        "Verification of step {} found issues: {issues}",
                        step.step_number
                    ))
                    .await;
                Ok(Some(StepRun::Again))
            }
            VerificationAction::EscalateToUser => {
                let escalation = Escalation::new(
                    step.step_number,
                    attempts.min(self.store.config().max_retries),
                    format!("Verification failed: {issues}"),
                );
                self.store.set_escalation(escalation.clone()).await;
                Ok(Some(StepRun::Escalated(escalation)))
            }
        }
    }
}
