use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line interface for the Waypoint plan execution engine
///
/// Waypoint tracks a multi-step plan for an autonomous caller, classifies
/// capability failures and decides how to recover from them. The `serve`
/// command exposes the planning call surface over MCP (Model Context
/// Protocol) on stdio; the other commands inspect the engine's decisions
/// locally.
#[derive(Parser)]
#[command(version, about, name = "wp")]
pub struct Args {
    /// Path to a JSON configuration file. Defaults to
    /// $XDG_CONFIG_HOME/waypoint/config.json when it exists
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    /// Override the per-step retry budget
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the MCP server on stdio
    Serve,
    /// Show how a capability error would be classified and recovered from
    #[command(alias = "c")]
    Classify {
        /// Error text as reported by the capability
        error: String,

        /// Retries already recorded for the step
        #[arg(long, default_value_t = 0)]
        retry_count: u32,
    },
    /// Show how a reply to an escalation would be interpreted
    Reply {
        /// Free-form reply text
        text: String,
    },
    /// Print the effective configuration as JSON
    Config,
}
