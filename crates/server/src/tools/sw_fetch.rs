//! sw_fetch tool implementation.
//!
//! Sends a request through the active worker, as a page in scope would.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swproxy_client::{Method, Registration, Request, RequestMode};
use swproxy_core::Error;
use url::Url;

use super::json_result;
use crate::error::ServerError;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL to request.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Request mode: "navigate", "same-origin", "no-cors" or "cors" (default).
    #[serde(default)]
    pub mode: Option<String>,

    /// Page issuing the request, as returned by client_open. Requests from a
    /// page no worker controls go straight to the network.
    #[serde(default)]
    pub client_id: Option<u64>,
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// "basic", "cors", "opaque" or "error".
    pub response_type: String,
    pub headers: Vec<(String, String)>,
    pub body_len: usize,
    /// Body decoded as UTF-8, lossy.
    pub body: String,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(registration: &Registration, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(params)?;
    tracing::debug!(url = %request.url, method = %request.method, "sw_fetch");

    let response = registration.fetch(request).await?;

    let headers = response
        .headers
        .iter()
        .map(|(name, value)| (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect();

    let output = SwFetchOutput {
        url: response.url.to_string(),
        status: response.status,
        status_text: response.status_text.clone(),
        response_type: response.response_type.to_string(),
        headers,
        body_len: response.body.len(),
        body: response.text_lossy(),
    };

    json_result(&output)
}

fn build_request(params: SwFetchParams) -> Result<Request, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = Url::parse(params.url.trim()).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;

    let method = match params.method.as_deref() {
        None => Method::GET,
        Some(m) => Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
            .map_err(|e| ServerError::InvalidParams(format!("method {m:?}: {e}")))?,
    };

    let mut request = Request::new(method, url);
    if let Some(mode) = params.mode.as_deref() {
        request = request.with_mode(mode.parse::<RequestMode>()?);
    }
    if let Some(id) = params.client_id {
        request = request.with_client(id);
    }

    Ok(request)
}
