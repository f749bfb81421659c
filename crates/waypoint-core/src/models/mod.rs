//! Data models for plans, steps and the retry ledger.
//!
//! This module contains the domain types the session store owns. Display
//! implementations for these models are located in [`crate::display::models`]
//! to keep data structures separate from presentation.
//!
//! # Step lifecycle
//!
//! ```text
//! Pending ──start──▶ InProgress ──complete──▶ Completed
//!                         │
//!                         └────fail────▶ Failed
//!
//! any status ──skip──▶ Skipped
//! ```
//!
//! A step's verification status is tracked separately and never moves the
//! primary status on its own.
//!
//! # Examples
//!
//! ```rust
//! use waypoint_core::models::{Step, StepStatus};
//!
//! let step = Step::new(1, "Create level A");
//! assert_eq!(step.status, StepStatus::Pending);
//! assert!(step.status.can_transition_to(StepStatus::InProgress));
//! assert!(!step.status.can_transition_to(StepStatus::Completed));
//! ```

pub mod plan;
pub mod requests;
pub mod retry;
pub mod status;
pub mod step;
pub mod summary;


pub use plan::Plan;
pub use requests::{PlanAction, StepCommand};
pub use retry::{Note, RetryRecord};
pub use status::{CompletionStatus, StepStatus, VerificationStatus};
pub use step::Step;
pub use summary::PlanProgress;
