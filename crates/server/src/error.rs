//! Errors raised by the server itself, before a request reaches the worker.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use swproxy_core::ConfigError;

/// Structured errors for the swproxy server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Tool parameters that do not describe a request.
    #[error("INVALID_INPUT: {0}")]
    InvalidParams(String),

    /// Configuration could not be loaded or failed validation.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

impl From<ServerError> for McpError {
    fn from(err: ServerError) -> Self {
        let code = match &err {
            ServerError::InvalidParams(_) => -32602,
            ServerError::Config(_) => -32010,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
