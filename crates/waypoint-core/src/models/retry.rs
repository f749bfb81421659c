//! Retry ledger and notes records.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// One failed attempt at a capability invocation.
///
/// Records are append-only and shared session-wide; a step's retry count is
/// derived from them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryRecord {
    pub step_number: u32,

    /// 1-based attempt index within the step
    pub attempt: u32,

    /// Raw error text reported by the capability
    pub error: String,

    /// Hint produced by the recovery engine for the next attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_modification: Option<String>,

    /// Attempt made on human guidance; excluded from the retry budget
    #[serde(default)]
    pub guided: bool,

    pub timestamp: Timestamp,
}

/// Free-text note attached to the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    /// Step the note refers to; `None` for plan-level notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,

    pub text: String,

    pub created_at: Timestamp,
}
