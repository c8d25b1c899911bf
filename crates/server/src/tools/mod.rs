//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swproxy server.

pub mod cache_keys;
pub mod clients;
pub mod sw_fetch;
pub mod sw_update;

#[cfg(test)]
pub(crate) mod testing;

pub use cache_keys::{CacheKeysParams, keys_impl};
pub use clients::{ClientCloseParams, ClientOpenParams, close_impl, open_impl};
pub use sw_fetch::{SwFetchParams, fetch_impl};
pub use sw_update::{SwUpdateParams, update_impl};

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use swproxy_core::Error;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
