//! MCP server implementation for Waypoint
//!
//! Exposes the planning call surface (`create_plan`, `update_plan`,
//! `complete_plan`) plus a read-only `show_plan` to an autonomous caller over
//! the Model Context Protocol.

use anyhow::Result;
use log::{debug, error, info};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::broadcast::{error::RecvError, Receiver},
};
use waypoint_core::{ProgressEvent, SessionStore};

pub mod errors;
pub mod handlers;

pub use errors::to_mcp_error;
pub use handlers::{CompletePlan, CreatePlan, McpResult, UpdatePlan};

/// MCP server for Waypoint
#[derive(Clone)]
pub struct WaypointMcpServer {
    store: SessionStore,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl WaypointMcpServer {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            tool_router: Self::tool_router(),
        }
    }

    fn handlers(&self) -> handlers::McpHandlers {
        handlers::McpHandlers::new(self.store.clone())
    }

    #[tool(
        name = "create_plan",
        description = "Create the execution plan for a multi-step task before doing any work. Provide a goal and an ordered list of steps, each with a unique step_number and a description. Optional per step: tools_to_use, success_criteria, depends_on (step numbers that must complete first) and is_verification. Creating a plan replaces any previous plan and clears its retry history and notes."
    )]
    async fn create_plan(&self, Parameters(params): Parameters<CreatePlan>) -> McpResult {
        self.handlers().create_plan(&params).await
    }

    #[tool(
        name = "update_plan",
        description = "Record progress on the current plan. action is one of: start_step, complete_step (with result), fail_step (with reason), skip_step (with optional reason), add_step (with new_step: description and optional after_step) or note (with note and optional step_number). A step must be started before it is completed or failed, and only after every step in its depends_on has completed. Returns the changes made and the updated progress."
    )]
    async fn update_plan(&self, Parameters(params): Parameters<UpdatePlan>) -> McpResult {
        self.handlers().update_plan(&params).await
    }

    #[tool(
        name = "complete_plan",
        description = "Finish the current plan and produce a completion report. status is 'success', 'partial_success' or 'failed'; summary describes what was achieved. Optionally report issues_encountered, elements_created, elements_modified and recommendations. Step counts default to those recorded on the plan. Calling again with the same arguments returns the same report."
    )]
    async fn complete_plan(&self, Parameters(params): Parameters<CompletePlan>) -> McpResult {
        self.handlers().complete_plan(&params).await
    }

    #[tool(
        name = "show_plan",
        description = "Show the current plan with every step's status, progress counts, retries, notes and any pending escalation waiting for a human reply."
    )]
    async fn show_plan(&self) -> McpResult {
        self.handlers().show_plan().await
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for WaypointMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "waypoint".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(r#"Waypoint tracks the plan for a multi-step task so progress survives failures and can be reported at the end.

## Workflow
1. Call `create_plan` with a goal and numbered steps before doing any work
2. For each step: `update_plan` with `start_step`, do the work, then `complete_step` with a result (or `fail_step` / `skip_step` with a reason)
3. Use `update_plan` with `note` to record observations and `add_step` when new work turns up
4. Call `complete_plan` with a status and summary when every step is settled

## Guidelines
- Steps with `depends_on` can only start once their prerequisites are completed
- Mark checking steps with `is_verification`
- Use `show_plan` to review progress at any time"#.to_string()),
        }
    }
}

/// Log progress events until the store is dropped.
async fn log_events(mut events: Receiver<ProgressEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => info!("progress: {json}"),
                Err(e) => debug!("Unserializable progress event: {e}"),
            },
            Err(RecvError::Lagged(missed)) => debug!("Missed {missed} progress events"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Run the MCP server with stdio transport
pub async fn run_stdio_server(server: WaypointMcpServer) -> Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    info!("Starting Waypoint MCP server on stdio");
    debug!(
        "Server created with {} tools",
        server.tool_router.list_all().len()
    );

    tokio::spawn(log_events(server.store.subscribe()));

    let service = server.serve(stdio()).await.inspect_err(|e| {
        error!("serving error: {e:?}");
    })?;

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = service.waiting() => {
            match result {
                Ok(_) => info!("MCP server stopped normally"),
                Err(e) => error!("MCP server error: {e:?}"),
            }
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
    }

    info!("MCP server shutdown complete");
    Ok(())
}
