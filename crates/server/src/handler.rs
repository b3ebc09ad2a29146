//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::AppState;
use crate::tools::cache_purge::{CachePurgeParams, purge_impl};
use crate::tools::conflict_guard::{ConflictGuardParams, guard_impl};
use crate::tools::meta_resolve::{MetaResolveParams, resolve_impl};
use crate::tools::pages::{PageDeleteParams, PageSaveParams, delete_impl, save_impl};
use crate::tools::should_index::{ShouldIndexParams, should_index_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for pagemeta.
#[derive(Clone)]
pub struct PageMetaServer {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PageMetaServer {
    /// Create a new server handler.
    pub fn new(state: AppState) -> Self {
        Self { tool_router: Self::tool_router(), state: Arc::new(state) }
    }

    /// Resolve SEO metadata for a URL.
    ///
    /// Each call gets its own override context, so overrides never reach the shared cache.
    #[tool(
        description = "Resolve SEO metadata for a URL. Returns the identity, source (cache, database or fallback), metadata, rendered head tags and JSON-LD scripts. Optional per-call overrides bypass the cache."
    )]
    async fn meta_resolve(&self, params: Parameters<MetaResolveParams>) -> Result<CallToolResult, McpError> {
        resolve_impl(&self.state, params.0).await
    }

    #[tool(description = "Decide whether a URL should be indexed. Returns the decision, the rule that made it, and the implied robots directive and canonical URL.")]
    async fn meta_should_index(&self, params: Parameters<ShouldIndexParams>) -> Result<CallToolResult, McpError> {
        should_index_impl(&self.state, params.0).await
    }

    /// Remove duplicate SEO tags from an HTML response.
    #[tool(
        description = "Remove duplicate title, description, canonical, Open Graph, Twitter and related meta tags from an HTML document, keeping the first of each. Returns the processed HTML and the removed duplicates."
    )]
    async fn conflict_guard(&self, params: Parameters<ConflictGuardParams>) -> Result<CallToolResult, McpError> {
        guard_impl(&self.state, params.0).await
    }

    #[tool(description = "Create a page metadata record, or replace one by id. Purges the cache for the previous and new identity.")]
    async fn page_save(&self, params: Parameters<PageSaveParams>) -> Result<CallToolResult, McpError> {
        save_impl(&self.state, params.0).await
    }

    #[tool(description = "Delete a page metadata record by id and purge its cache entry.")]
    async fn page_delete(&self, params: Parameters<PageDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(&self.state, params.0).await
    }

    #[tool(description = "Forget the cached metadata for a URL or a (domain, path, query_hash) identity, and optionally delete expired entries.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.state, params.0).await
    }
}

impl ServerHandler for PageMetaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "pagemeta".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
