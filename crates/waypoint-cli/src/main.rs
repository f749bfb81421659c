//! Waypoint CLI Application
//!
//! Command-line front end for the waypoint execution engine. `wp serve`
//! exposes the planning call surface over MCP; the remaining commands inspect
//! engine decisions locally.

mod args;
mod cli;
mod mcp;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use log::info;
use mcp::{run_stdio_server, WaypointMcpServer};
use renderer::TerminalRenderer;
use waypoint_core::{EngineConfig, SessionBuilder};
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        config_file,
        max_retries,
        no_color,
        command,
    } = Args::parse();

    let mut config =
        EngineConfig::load(config_file.as_deref()).context("Failed to load configuration")?;
    if let Some(max_retries) = max_retries {
        config.max_retries = max_retries;
    }

    let renderer = TerminalRenderer::new(!no_color);

    info!("Waypoint started");

    match command {
        Serve => {
            let store = SessionBuilder::new()
                .with_config(config)
                .build()
                .context("Failed to initialize session")?;
            run_stdio_server(WaypointMcpServer::new(store))
                .await
                .context("MCP server failed")
        }
        Classify { error, retry_count } => Cli::new(config, renderer).classify(&error, retry_count),
        Reply { text } => Cli::new(config, renderer).reply(&text),
        Config => Cli::new(config, renderer).show_config(),
    }
}
