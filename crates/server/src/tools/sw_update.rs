//! sw_update tool implementation.
//!
//! Runs a new worker generation through install and, when allowed, activate.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swproxy_client::Registration;
use swproxy_core::WorkerConfig;

use super::json_result;
use crate::error::ServerError;

/// Input parameters for the sw_update tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwUpdateParams {
    /// Partition version for the new generation. Defaults to the configured one.
    #[serde(default)]
    pub version: Option<String>,
}

/// Implementation of the sw_update tool.
///
/// `config` is the freshly loaded configuration; `params.version` overrides
/// its partition version.
pub async fn update_impl(
    registration: &Registration, config: WorkerConfig, params: SwUpdateParams,
) -> Result<CallToolResult, McpError> {
    let config = match params.version {
        Some(version) => config.with_partition_version(version),
        None => config,
    };
    config.validate().map_err(ServerError::from)?;

    let outcome = registration.update(config).await?;

    json_result(&outcome)
}
