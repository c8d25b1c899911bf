//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::error::ServerError;
use crate::tools::{
    CacheKeysParams, ClientCloseParams, ClientOpenParams, SwFetchParams, SwUpdateParams, close_impl, fetch_impl,
    keys_impl, open_impl, update_impl,
};

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
use swproxy_client::Registration;
use swproxy_core::WorkerConfig;

/// The main MCP server handler for mcp-swproxy.
#[derive(Clone)]
pub struct McpSwProxyServer {
    tool_router: ToolRouter<Self>,
    registration: Arc<Registration>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl McpSwProxyServer {
    /// Create a new server handler around `registration`.
    pub fn new(registration: Arc<Registration>) -> Self {
        Self { tool_router: Self::tool_router(), registration }
    }

    /// Send a request through the active worker.
    #[tool(
        description = "Send a request through the active worker. Returns status, response type, headers and body as served by the cache or the network."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, params.0).await
    }

    /// Reload configuration and install a new worker generation.
    #[tool(
        description = "Reload configuration and install a new worker generation. Activates it unless pages of the current generation are still open."
    )]
    async fn sw_update(&self, params: Parameters<SwUpdateParams>) -> Result<CallToolResult, McpError> {
        let config = WorkerConfig::load().map_err(ServerError::from)?;
        update_impl(&self.registration, config, params.0).await
    }

    #[tool(description = "List cache partitions, or the request keys stored in one partition.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.registration, params.0).await
    }

    #[tool(description = "Open a page in scope. The page is controlled by the active worker generation.")]
    async fn client_open(&self, params: Parameters<ClientOpenParams>) -> Result<CallToolResult, McpError> {
        open_impl(&self.registration, params.0).await
    }

    #[tool(description = "Close a page. A waiting worker generation activates once no page uses the current one.")]
    async fn client_close(&self, params: Parameters<ClientCloseParams>) -> Result<CallToolResult, McpError> {
        close_impl(&self.registration, params.0).await
    }
}

impl ServerHandler for McpSwProxyServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-swproxy".into(),
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
