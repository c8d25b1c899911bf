//! cache_keys tool implementation.
//!
//! Lists partitions, or the request keys stored in one of them.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swproxy_client::Registration;
use swproxy_core::{Error, RequestKey};

use super::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Partition to list. Omit to list partition names only.
    #[serde(default)]
    pub partition: Option<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    /// Partition names in creation order.
    pub partitions: Vec<String>,

    /// Stored request keys of the requested partition, in insertion order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<RequestKey>>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(registration: &Registration, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let storage = registration.storage();
    let partitions = storage.keys().await?;

    let keys = match params.partition {
        None => None,
        Some(name) => {
            if !partitions.contains(&name) {
                return Err(Error::InvalidInput(format!("no such partition: {name}")).into());
            }
            Some(storage.partition(&name).keys().await?)
        }
    };

    json_result(&CacheKeysOutput { partitions, keys })
}
