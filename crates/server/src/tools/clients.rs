//! client_open / client_close tool implementations.
//!
//! Pages opened here count towards the pages controlled by the active
//! generation, which decides whether a new generation has to wait.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swproxy_client::Registration;
use swproxy_client::worker::ClientInfo;
use swproxy_core::Error;
use url::Url;

use super::json_result;

/// Parameters for the client_open tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientOpenParams {
    /// URL of the page being opened.
    pub url: String,
}

/// Parameters for the client_close tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientCloseParams {
    pub client_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientOpenOutput {
    pub client: ClientInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCloseOutput {
    /// Whether the page was open.
    pub closed: bool,
    /// Version of the active generation after closing.
    pub active: Option<String>,
}

/// Implementation of the client_open tool.
pub async fn open_impl(registration: &Registration, params: ClientOpenParams) -> Result<CallToolResult, McpError> {
    let url = Url::parse(params.url.trim()).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;

    let id = registration.open_client(&url).await;
    let client = registration
        .clients()
        .get(id)
        .await
        .ok_or_else(|| Error::InvalidInput(format!("client {id} closed while opening")))?;

    json_result(&ClientOpenOutput { client })
}

/// Implementation of the client_close tool.
pub async fn close_impl(registration: &Registration, params: ClientCloseParams) -> Result<CallToolResult, McpError> {
    let closed = registration.close_client(params.client_id).await?;
    let active = registration.active().await.map(|worker| worker.version().to_string());

    json_result(&ClientCloseOutput { closed, active })
}
