//! Conversation-scoped session state behind a single-writer store.
//!
//! The [`SessionStore`] is the only way to read or mutate a [`Session`]: the
//! current plan, the retry ledger, notes, the execution context and any
//! pending escalation. It is shared by the planning interface, the
//! dispatcher and the executor, and read by progress observers.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │ Planning calls  │    │  SessionStore   │    │    Observers    │
//! │ Dispatcher      │───▶│ (Mutex<Session>)│───▶│ (snapshots and  │
//! │ Executor        │    │                 │    │  ProgressEvent) │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! ## Submodules
//!
//! - [`builder`]: Factory for a configured [`SessionStore`]
//! - [`plan_ops`]: `create_plan`, `update_plan`, `complete_plan`, cancellation
//! - [`step_ops`]: step transitions, the retry ledger and verification records
//! - [`events`]: [`ProgressEvent`] notifications
//!
//! Every operation validates fully before mutating, and the lock is held
//! only for the duration of one operation, never across a capability call
//! or a delay. Readers receive cloned [`SessionSnapshot`]s.
//!
//! # Examples
//!
//! ```rust
//! use waypoint_core::{
//!     params::{CreatePlan, StepSpec, UpdatePlan},
//!     SessionBuilder,
//! };
//!
//! # async fn example() -> waypoint_core::Result<()> {
//! let store = SessionBuilder::new().build()?;
//!
//! store
//!     .create_plan(&CreatePlan {
//!         goal: "Create 3 levels".to_string(),
//!         steps: vec![
//!             StepSpec::new(1, "create level A"),
//!             StepSpec::new(2, "create level B"),
//!             StepSpec::new(3, "verify").verification(),
//!         ],
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! store.update_plan(&UpdatePlan::for_step("start_step", 1)).await?;
//! store
//!     .update_plan(&UpdatePlan::for_step("complete_step", 1).with_result("ok"))
//!     .await?;
//!
//! assert_eq!(store.progress().await?.completed_steps, 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

pub mod builder;
pub mod events;
pub mod plan_ops;
pub mod step_ops;

#[cfg(test)]
mod tests;

pub use builder::SessionBuilder;
pub use events::ProgressEvent;

use crate::{
    config::EngineConfig,
    display::CompletionReport,
    escalation::Escalation,
    models::{Note, Plan, RetryRecord},
    params::CompletePlan,
};

const EVENT_CAPACITY: usize = 256;

/// The aggregate root for one conversation.
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) plan: Option<Plan>,
    pub(crate) retries: Vec<RetryRecord>,
    pub(crate) notes: Vec<Note>,
    /// Guidance and verification feedback handed to the step planner
    pub(crate) context: Vec<String>,
    pub(crate) escalation: Option<Escalation>,
    /// Step whose next failed attempt is guided and does not count
    pub(crate) guided_step: Option<u32>,
    /// Arguments and report of the first successful `complete_plan`
    pub(crate) completion: Option<(CompletePlan, CompletionReport)>,
}

impl Session {
    /// Clear everything tied to the current plan.
    fn clear(&mut self) {
        *self = Session::default();
    }
}

/// A consistent, owned copy of the session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub plan: Option<Plan>,
    pub retries: Vec<RetryRecord>,
    pub notes: Vec<Note>,
    pub context: Vec<String>,
    pub escalation: Option<Escalation>,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            plan: session.plan.clone(),
            retries: session.retries.clone(),
            notes: session.notes.clone(),
            context: session.context.clone(),
            escalation: session.escalation.clone(),
        }
    }
}

/// Shared handle to the session. Cloning is cheap and yields a handle to the
/// same state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    pub(crate) state: Arc<Mutex<Session>>,
    pub(crate) events: broadcast::Sender<ProgressEvent>,
    pub(crate) config: Arc<EngineConfig>,
}

impl SessionStore {
    /// Creates an empty store with the given configuration.
    pub(crate) fn new(config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(Session::default())),
            events,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receive progress events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Copy of the full session state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&*self.state.lock().await)
    }

    /// Copy of the current plan, if any.
    pub async fn plan(&self) -> Option<Plan> {
        self.state.lock().await.plan.clone()
    }

    /// Forget the plan, ledger, notes and context, as at the start of a new
    /// conversation.
    pub async fn reset(&self) {
        self.state.lock().await.clear();
        log::info!("Session reset");
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }
}
