//! Engine configuration.
//!
//! Configuration is a small JSON document. It is read from an explicit path
//! when one is given, otherwise from `$XDG_CONFIG_HOME/waypoint/config.json`
//! when that file exists, otherwise the defaults apply. Every field is
//! optional in the file.
//!
//! ```json
//! {
//!   "max_retries": 3,
//!   "verification_strictness": "strict",
//!   "retry_delays": { "element_not_found_ms": 250 }
//! }
//! ```

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{EngineError, Result, ResultExt},
    recovery::ErrorCategory,
};

/// How thorough an automatic verification check should be.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStrictness {
    Minimal,
    #[default]
    Standard,
    Strict,
}

impl FromStr for VerificationStrictness {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" => Ok(VerificationStrictness::Minimal),
            "standard" => Ok(VerificationStrictness::Standard),
            "strict" => Ok(VerificationStrictness::Strict),
            _ => Err(format!(
                "Invalid verification strictness: {s}. Must be 'minimal', 'standard', or 'strict'"
            )),
        }
    }
}

/// Wait before the next attempt, per failure category, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryDelays {
    pub invalid_parameter_ms: u64,
    pub element_not_found_ms: u64,
    pub type_not_available_ms: u64,
    pub transaction_failed_ms: u64,
    pub timeout_ms: u64,
}

impl Default for RetryDelays {
    fn default() -> Self {
        Self {
            invalid_parameter_ms: 0,
            element_not_found_ms: 500,
            type_not_available_ms: 0,
            transaction_failed_ms: 1000,
            timeout_ms: 2000,
        }
    }
}

impl RetryDelays {
    /// All delays zero. Handy for tests and dry runs.
    pub fn none() -> Self {
        Self {
            invalid_parameter_ms: 0,
            element_not_found_ms: 0,
            type_not_available_ms: 0,
            transaction_failed_ms: 0,
            timeout_ms: 0,
        }
    }

    /// Delay for a category. Categories that never retry have no delay.
    pub fn for_category(&self, category: ErrorCategory) -> Duration {
        let ms = match category {
            ErrorCategory::InvalidParameter => self.invalid_parameter_ms,
            ErrorCategory::ElementNotFound => self.element_not_found_ms,
            ErrorCategory::TypeNotAvailable => self.type_not_available_ms,
            ErrorCategory::TransactionFailed => self.transaction_failed_ms,
            ErrorCategory::Timeout => self.timeout_ms,
            ErrorCategory::GeometryConflict | ErrorCategory::Unknown => 0,
        };
        Duration::from_millis(ms)
    }
}

/// Settings consumed by the recovery engine, dispatcher and verification
/// trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Failed attempts allowed per step before escalating
    pub max_retries: u32,
    /// Whether the engine is driving steps without a human in the loop
    pub autonomous_mode: bool,
    /// Whether mutating batches trigger an automatic outcome check
    pub auto_verification: bool,
    pub verification_strictness: VerificationStrictness,
    /// Capability invoked to check an outcome
    pub verification_capability: String,
    pub retry_delays: RetryDelays,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            autonomous_mode: true,
            auto_verification: true,
            verification_strictness: VerificationStrictness::Standard,
            verification_capability: "check_outcome".to_string(),
            retry_delays: RetryDelays::default(),
        }
    }
}

impl EngineConfig {
    /// Read configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::FileSystem` if the file cannot be read and
    /// `EngineError::Configuration` if it is not valid configuration JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::FileSystem {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&contents)
            .with_context(format!("Invalid configuration in {}", path.display()))
    }

    /// Load configuration from an explicit path, or fall back to the XDG
    /// location, or to defaults when neither exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_config_path() {
                Some(path) => {
                    log::debug!("Loading configuration from {}", path.display());
                    Self::from_file(&path)
                }
                None => Ok(Self::default()),
            },
        }
    }

    /// Existing configuration file under the XDG config directory, if any.
    pub fn default_config_path() -> Option<PathBuf> {
        xdg::BaseDirectories::with_prefix("waypoint").find_config_file("config.json")
    }
}
