//! Core library for the Waypoint plan execution engine.
//!
//! Waypoint tracks a multi-step plan for an autonomous caller, runs each step
//! through opaque external capabilities, checks outcomes, and recovers from
//! failures by retrying, rolling back, skipping or asking a human.
//!
//! # Components
//!
//! - **Session store** ([`session`]): the plan, step state machine, retry
//!   ledger and notes behind a single-writer store
//! - **Recovery engine** ([`recovery`]): failure classification and the
//!   strategy table
//! - **Dispatcher** ([`dispatch`]): the capability retry loop
//! - **Verification trigger** ([`verification`]): when to check outcomes and
//!   how to read the result
//! - **Escalation** ([`escalation`]): the pause message and reply
//!   interpretation
//! - **Executor** ([`executor`]): the sequential control loop tying these
//!   together
//!
//! Output for humans and callers is markdown produced by `Display`
//! implementations in [`display`].
//!
//! # Quick Start
//!
//! ```rust
//! use waypoint_core::{
//!     params::{CreatePlan, StepSpec},
//!     recovery::{FailureContext, RecoveryAction, RecoveryEngine},
//!     SessionBuilder,
//! };
//!
//! # async fn example() -> waypoint_core::Result<()> {
//! let store = SessionBuilder::new().build()?;
//! let plan = store
//!     .create_plan(&CreatePlan {
//!         goal: "Create 3 levels".to_string(),
//!         steps: vec![StepSpec::new(1, "create level A")],
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{plan}");
//!
//! let engine = RecoveryEngine::new(store.config());
//! let strategy = engine.decide(&FailureContext::new(1, "Element not found: Level A", 0));
//! assert_eq!(strategy.action, RecoveryAction::RefreshContextAndRetry);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod escalation;
pub mod executor;
pub mod models;
pub mod params;
pub mod recovery;
pub mod session;
pub mod verification;

// Re-export commonly used types
pub use config::{EngineConfig, RetryDelays, VerificationStrictness};
pub use dispatch::{
    ActionRequest, CapabilityProvider, CapabilityResult, DispatchOutcome, Dispatcher,
    NoTransactions, TransactionGuard,
};
pub use display::{CompletionReport, CreateResult, LocalDateTime, UpdateResult};
pub use error::{EngineError, Result};
pub use escalation::{interpret_reply, Escalation, ResumeDecision};
pub use executor::{Executor, LoopOutcome, StepPlanner};
pub use models::{
    CompletionStatus, Note, Plan, PlanProgress, RetryRecord, Step, StepStatus, VerificationStatus,
};
pub use params::{CompletePlan, CreatePlan, NewStep, StepSpec, UpdatePlan};
pub use recovery::{
    classify_error, ErrorCategory, FailureContext, RecoveryAction, RecoveryEngine,
    RecoveryStrategy,
};
pub use session::{ProgressEvent, SessionBuilder, SessionSnapshot, SessionStore};
