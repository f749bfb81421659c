//! Error handling utilities for MCP server

use rmcp::ErrorData;
use waypoint_core::EngineError;

/// Convert engine errors to MCP errors.
///
/// Rejected planning calls become `invalid_params` so the caller knows the
/// request can be corrected and sent again; anything else is internal.
pub fn to_mcp_error(message: &str, error: &EngineError) -> ErrorData {
    let message = format!("{message}: {error}");
    if error.is_validation() {
        ErrorData::invalid_params(message, None)
    } else {
        ErrorData::internal_error(message, None)
    }
}
