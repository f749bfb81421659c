//! Display formatting and result types.
//!
//! Domain models implement `Display` directly; operation outcomes get small
//! wrapper types so each planning call has one canonical rendering.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Domain Models  │    │  Result Types   │    │    Markdown     │
//! │  (Plan, Step)   │───▶│  & Reports      │───▶│  (Terminal/MCP) │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! - [`models`]: Display implementations for domain models
//! - [`results`]: `CreateResult` and `UpdateResult`
//! - [`report`]: the `complete_plan` report
//! - [`datetime`]: timestamp formatting

pub mod datetime;
pub mod models;
pub mod report;
pub mod results;

pub use datetime::{LocalDateTime, UtcDateTime};
pub use report::CompletionReport;
pub use results::{CreateResult, UpdateResult};
