//! Failure classification from raw error text.
//!
//! Capabilities report failures as free text, so classification is an ordered
//! list of substring rules over the lowercased message. The first matching
//! rule wins. The rules are intentionally coarse and order-sensitive: a
//! message such as "invalid parameter: type not found" is an
//! `InvalidParameter`, not an `ElementNotFound`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a capability failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidParameter,
    ElementNotFound,
    TypeNotAvailable,
    GeometryConflict,
    TransactionFailed,
    Timeout,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidParameter => "invalid_parameter",
            ErrorCategory::ElementNotFound => "element_not_found",
            ErrorCategory::TypeNotAvailable => "type_not_available",
            ErrorCategory::GeometryConflict => "geometry_conflict",
            ErrorCategory::TransactionFailed => "transaction_failed",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Whether the category is subject to the per-step retry budget.
    ///
    /// Geometry conflicts are skipped and unknown failures escalated on first
    /// occurrence, so neither ever consults the budget.
    pub fn uses_retry_budget(&self) -> bool {
        !matches!(
            self,
            ErrorCategory::GeometryConflict | ErrorCategory::Unknown
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered rules; the first category whose predicate matches is returned.
const RULES: &[(ErrorCategory, fn(&str) -> bool)] = &[
    (ErrorCategory::InvalidParameter, is_invalid_parameter),
    (ErrorCategory::ElementNotFound, is_element_not_found),
    (ErrorCategory::TypeNotAvailable, is_type_not_available),
    (ErrorCategory::GeometryConflict, is_geometry_conflict),
    (ErrorCategory::TransactionFailed, is_transaction_failed),
    (ErrorCategory::Timeout, is_timeout),
];

fn is_invalid_parameter(e: &str) -> bool {
    contains_any(e, &["parameter", "value", "invalid"])
}

fn is_element_not_found(e: &str) -> bool {
    contains_any(e, &["not found", "does not exist", "no element"])
}

fn is_type_not_available(e: &str) -> bool {
    e.contains("type") && contains_any(e, &["not available", "not loaded"])
}

fn is_geometry_conflict(e: &str) -> bool {
    contains_any(e, &["geometry", "overlap", "conflict", "intersect"])
}

fn is_transaction_failed(e: &str) -> bool {
    contains_any(e, &["transaction", "rollback", "commit"])
}

fn is_timeout(e: &str) -> bool {
    contains_any(e, &["timeout", "timed out"])
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Classify an error message, case-insensitively.
///
/// # Examples
///
/// ```rust
/// use waypoint_core::recovery::{classify_error, ErrorCategory};
///
/// assert_eq!(classify_error("Element not found: Level B"), ErrorCategory::ElementNotFound);
/// assert_eq!(classify_error("Operation TIMED OUT"), ErrorCategory::Timeout);
/// assert_eq!(classify_error("disk on fire"), ErrorCategory::Unknown);
/// ```
pub fn classify_error(error: &str) -> ErrorCategory {
    let normalized = error.to_lowercase();
    RULES
        .iter()
        .find(|(_, matches)| matches(&normalized))
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}

/// Input adjustment hint for an invalid-parameter failure.
pub(crate) fn parameter_hint(error: &str) -> String {
    let normalized = error.to_lowercase();

    if normalized.contains("level") {
        "Check that the referenced level exists and pass its exact name or id".to_string()
    } else if contains_any(&normalized, &["coordinate", "point", "location"]) {
        "Check coordinate values and units; coordinates are expected in model units".to_string()
    } else if normalized.contains("type") {
        "Query the available types and pass an exact type name".to_string()
    } else {
        "Review the parameter values against the capability's input schema".to_string()
    }
}
