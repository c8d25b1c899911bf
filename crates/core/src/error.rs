//! Unified error types for swproxy.
//!
//! Every variant carries a stable code prefix so host logs and MCP clients
//! can match on it without parsing free text.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the interceptor and its host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., storing a non-GET request).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL could not be parsed or resolved against the scope.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The partition store could not be opened.
    #[error("CACHE_OPEN_FAILED: {partition}: {reason}")]
    CacheOpen { partition: String, reason: String },

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded back into a snapshot.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// A seed resource could not be fetched or stored during install.
    #[error("SETUP_FAILED: {url}: {reason}")]
    SetupFailed { url: String, reason: String },

    /// Transport-level network failure.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Neither the cache nor the network could answer the request.
    #[error("OFFLINE: {url}: {reason}")]
    Offline { url: String, reason: String },

    /// Lifecycle operation attempted from the wrong worker state.
    #[error("INVALID_STATE: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    /// No handler registered for the dispatched event.
    #[error("UNHANDLED_EVENT: {0}")]
    UnhandledEvent(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::InvalidUrl(_) => -32003,
            Error::CacheOpen { .. } | Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptEntry(_) => -32002,
            Error::SetupFailed { .. } => -32013,
            Error::Network(_) => -32008,
            Error::FetchTimeout(_) => -32006,
            Error::FetchTooLarge(_) => -32007,
            Error::Offline { .. } => -32014,
            Error::InvalidState { .. } => -32015,
            Error::UnhandledEvent(_) => -32601,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
