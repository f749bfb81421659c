//! Capability dispatch with recovery.
//!
//! The [`Dispatcher`] invokes one external action for a step and, when the
//! capability reports failure, asks the [`RecoveryEngine`] what to do:
//!
//! 1. Invoke the capability. Success returns immediately.
//! 2. On failure, decide a strategy from the error text and the step's
//!    retry count, then append a [`RetryRecord`](crate::models::RetryRecord)
//!    before acting on it.
//! 3. Retry strategies wait out the strategy's delay and go again, passing
//!    the suggested modification back on the request. Rollback strategies
//!    first ask the [`TransactionGuard`] to roll back.
//! 4. Skips mark the step Skipped; escalations park an [`Escalation`] on
//!    the session. Both end the dispatch.
//!
//! Capability calls and delays race a [`CancellationToken`]. When it fires
//! the plan is cancelled and the step is left exactly as it was.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    error::Result,
    escalation::Escalation,
    recovery::{FailureContext, RecoveryAction, RecoveryEngine, RecoveryStrategy},
    session::SessionStore,
};


/// One invocation of an external capability on behalf of a step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRequest {
    pub step_number: u32,
    /// Capability name
    pub action: String,
    /// Payload validated against the capability's schema by the provider
    pub input: Value,
    /// Whether the capability changes external state
    #[serde(default)]
    pub mutating: bool,
    /// Adjustment suggested by recovery after a failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_hint: Option<String>,
}

impl ActionRequest {
    pub fn new(step_number: u32, action: impl Into<String>, input: Value) -> Self {
        Self {
            step_number,
            action: action.into(),
            input,
            mutating: false,
            modification_hint: None,
        }
    }

    /// Mark the request as changing external state.
    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }
}

/// What a capability reported.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityResult {
    Success(Value),
    Failure(String),
}

/// Executes named actions. Implemented outside the engine.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Run one action. Long-running providers should observe `cancel`.
    async fn execute(&self, request: &ActionRequest, cancel: &CancellationToken)
        -> CapabilityResult;
}

/// Undoes in-flight transactional state before a retry.
#[async_trait]
pub trait TransactionGuard: Send + Sync {
    async fn rollback_if_active(&self);
}

/// Transaction guard for providers without transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransactions;

#[async_trait]
impl TransactionGuard for NoTransactions {
    async fn rollback_if_active(&self) {}
}

/// Terminal result of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Completed {
        payload: Value,
        /// Attempts made, including the successful one
        attempts: u32,
    },
    /// The step was marked Skipped
    Skipped { reason: String },
    /// Recovery gave up; a human must decide how to continue
    NeedsHuman {
        escalation: Escalation,
        strategy: RecoveryStrategy,
    },
    Cancelled,
}

/// Waits for `delay` unless `cancel` fires first. Returns false when
/// cancelled.
pub async fn cancellable_delay(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Runs capability requests through the recovery loop.
#[derive(Clone)]
pub struct Dispatcher {
    store: SessionStore,
    provider: Arc<dyn CapabilityProvider>,
    transactions: Arc<dyn TransactionGuard>,
    engine: RecoveryEngine,
}

impl Dispatcher {
    pub fn new(store: SessionStore, provider: Arc<dyn CapabilityProvider>) -> Self {
        let engine = RecoveryEngine::new(store.config());
        Self {
            store,
            provider,
            transactions: Arc::new(NoTransactions),
            engine,
        }
    }

    pub fn with_transactions(mut self, transactions: Arc<dyn TransactionGuard>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run `request` until it succeeds, is skipped, escalates or is
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Only session errors surface here, such as the step disappearing from
    /// the plan. Capability failures never do.
    pub async fn dispatch(
        &self,
        mut request: ActionRequest,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome> {
        let step_number = request.step_number;
        let mut attempts = 0;

        loop {
            if cancel.is_cancelled() {
                return self.cancelled().await;
            }

            attempts += 1;
            debug!(
                "Step {step_number}: invoking {} (attempt {attempts})",
                request.action
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled().await,
                result = self.provider.execute(&request, cancel) => result,
            };

            let error = match result {
                CapabilityResult::Success(payload) => {
                    debug!("Step {step_number}: {} succeeded", request.action);
                    return Ok(DispatchOutcome::Completed { payload, attempts });
                }
                CapabilityResult::Failure(error) => error,
            };

            let retry_count = self.store.retry_count(step_number).await;
            let failure = FailureContext::new(step_number, error.clone(), retry_count)
                .with_tool(request.action.clone(), request.input.clone());
            let strategy = self.engine.decide(&failure);

            self.store
                .record_retry(
                    step_number,
                    error.clone(),
                    strategy.suggested_modification.clone(),
                )
                .await?;

            match strategy.action {
                RecoveryAction::SkipAndContinue => {
                    info!("Step {step_number}: skipping after '{error}'");
                    self.store
                        .skip_step(step_number, Some(strategy.reason.clone()))
                        .await?;
                    return Ok(DispatchOutcome::Skipped {
                        reason: strategy.reason,
                    });
                }
                RecoveryAction::EscalateToUser => {
                    let retries = retry_count.min(self.engine.max_retries());
                    warn!("Step {step_number}: escalating after {retries} retries: {error}");
                    let escalation = Escalation::new(step_number, retries, error);
                    self.store.set_escalation(escalation.clone()).await;
                    return Ok(DispatchOutcome::NeedsHuman {
                        escalation,
                        strategy,
                    });
                }
                RecoveryAction::RollbackAndRetry => {
                    debug!("Step {step_number}: rolling back before retry");
                    self.transactions.rollback_if_active().await;
                }
                RecoveryAction::RetryWithModification
                | RecoveryAction::RefreshContextAndRetry
                | RecoveryAction::RetryWithAlternative => {}
            }

            request.modification_hint = strategy.suggested_modification;
            debug!(
                "Step {step_number}: {} in {}ms",
                strategy.action,
                strategy.retry_delay.as_millis()
            );
            if !cancellable_delay(strategy.retry_delay, cancel).await {
                return self.cancelled().await;
            }
        }
    }

    async fn cancelled(&self) -> Result<DispatchOutcome> {
        self.store.cancel_plan(Some("cancellation requested")).await?;
        Ok(DispatchOutcome::Cancelled)
    }
}
