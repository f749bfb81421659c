//! Local command handlers.
//!
//! These commands never touch a plan. They show what the engine would decide
//! for a given input, which is handy when tuning configuration or checking
//! how a capability's error text will be treated.

use std::fmt;

use anyhow::{Context, Result};
use waypoint_core::{
    classify_error, interpret_reply, EngineConfig, ErrorCategory, FailureContext,
    RecoveryEngine, RecoveryStrategy, ResumeDecision,
};

use crate::renderer::TerminalRenderer;

pub struct Cli {
    config: EngineConfig,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(config: EngineConfig, renderer: TerminalRenderer) -> Self {
        Self { config, renderer }
    }

    pub fn classify(&self, error: &str, retry_count: u32) -> Result<()> {
        self.renderer
            .render(&self.classification(error, retry_count).to_string())
    }

    pub fn reply(&self, text: &str) -> Result<()> {
        let decision = match interpret_reply(text) {
            ResumeDecision::Skip => "Skip the paused step and continue".to_string(),
            ResumeDecision::Abort => "Abort the plan".to_string(),
            ResumeDecision::Guidance(text) => {
                format!("Retry the paused step with guidance: {text}")
            }
        };
        self.renderer
            .render(&format!("# Escalation reply\n\n- Decision: {decision}\n"))
    }

    /// Print the configuration as JSON, bypassing the markdown renderer so
    /// the output can be saved as a config file.
    pub fn show_config(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.config)
            .context("Failed to serialize configuration")?;
        println!("{json}");
        Ok(())
    }

    fn classification(&self, error: &str, retry_count: u32) -> Classification {
        Classification {
            category: classify_error(error),
            retry_count,
            max_retries: self.config.max_retries,
            strategy: RecoveryEngine::new(&self.config)
                .decide(&FailureContext::new(1, error, retry_count)),
        }
    }
}

/// What the recovery engine makes of a single failure.
struct Classification {
    category: ErrorCategory,
    retry_count: u32,
    max_retries: u32,
    strategy: RecoveryStrategy,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Failure classification")?;
        writeln!(f)?;
        writeln!(f, "- Category: {}", self.category)?;
        if self.category.uses_retry_budget() {
            writeln!(f, "- Retry budget: {}/{}", self.retry_count, self.max_retries)?;
        } else {
            writeln!(f, "- Retry budget: not consulted")?;
        }
        write!(f, "{}", self.strategy)
    }
}
