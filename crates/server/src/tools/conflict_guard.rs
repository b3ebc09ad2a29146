//! conflict_guard tool implementation.
//!
//! Runs the duplicate tag guard over caller-supplied HTML.

use pagemeta_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::AppState;

/// Input parameters for the conflict_guard tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConflictGuardParams {
    /// Full response body.
    pub html: String,

    /// `Content-Type` header of the response. When omitted the body is
    /// assumed to be HTML.
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Implementation of the conflict_guard tool.
pub async fn guard_impl(state: &AppState, params: ConflictGuardParams) -> Result<CallToolResult, McpError> {
    if params.html.is_empty() {
        return Err(Error::InvalidInput("html cannot be empty".to_string()).into());
    }

    let outcome = state.guard.process(params.html, params.content_type.as_deref());

    if let Some(reason) = outcome.skipped {
        tracing::debug!(?reason, "Conflict guard skipped response");
    } else if !outcome.conflicts.is_empty() {
        tracing::info!(conflicts = outcome.conflicts.len(), "Removed duplicate tags");
    }

    json_result(&outcome)
}
