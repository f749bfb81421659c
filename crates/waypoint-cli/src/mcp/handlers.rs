//! MCP tool handlers implementation

use log::debug;
use rmcp::{
    model::{CallToolResult, Content},
    ErrorData,
};
use schemars::JsonSchema;
use serde::Deserialize;
use waypoint_core::{display::CreateResult, params as core, SessionStore};

use super::to_mcp_error;

/// Generic MCP wrapper for core parameter types
///
/// `#[serde(transparent)]` passes deserialization straight through to the
/// wrapped core type, and the schema is the core type's schema, so the core
/// crate only needs its optional `schema` feature.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct McpParams<T>(T)
where
    T: JsonSchema;

impl<T> JsonSchema for McpParams<T>
where
    T: JsonSchema,
{
    fn schema_name() -> std::borrow::Cow<'static, str> {
        T::schema_name()
    }

    fn json_schema(g: &mut schemars::SchemaGenerator) -> schemars::Schema {
        T::json_schema(g)
    }
}

impl<T> AsRef<T> for McpParams<T>
where
    T: JsonSchema,
{
    fn as_ref(&self) -> &T {
        &self.0
    }
}

pub type CreatePlan = McpParams<core::CreatePlan>;
pub type UpdatePlan = McpParams<core::UpdatePlan>;
pub type CompletePlan = McpParams<core::CompletePlan>;

pub type McpResult = Result<CallToolResult, ErrorData>;

fn text(body: impl ToString) -> McpResult {
    Ok(CallToolResult::success(vec![Content::text(body.to_string())]))
}

/// Handler implementations for the MCP server
pub struct McpHandlers {
    store: SessionStore,
}

impl McpHandlers {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    pub async fn create_plan(&self, params: &CreatePlan) -> McpResult {
        debug!("create_plan: {:?}", params);

        let plan = self
            .store
            .create_plan(params.as_ref())
            .await
            .map_err(|e| to_mcp_error("Failed to create plan", &e))?;

        text(CreateResult::new(plan))
    }

    pub async fn update_plan(&self, params: &UpdatePlan) -> McpResult {
        debug!("update_plan: {:?}", params);

        let result = self
            .store
            .update_plan(params.as_ref())
            .await
            .map_err(|e| to_mcp_error("Failed to update plan", &e))?;

        text(result)
    }

    pub async fn complete_plan(&self, params: &CompletePlan) -> McpResult {
        debug!("complete_plan: {:?}", params);

        let report = self
            .store
            .complete_plan(params.as_ref())
            .await
            .map_err(|e| to_mcp_error("Failed to complete plan", &e))?;

        text(report)
    }

    pub async fn show_plan(&self) -> McpResult {
        debug!("show_plan");
        text(self.store.snapshot().await)
    }
}
