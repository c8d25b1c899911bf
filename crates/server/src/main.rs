//! mcp-swproxy server entry point.
//!
//! Boots the worker registration over the SQLite partition store, runs the
//! first install/activate, then serves the MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swproxy_client::{FetchClient, FetchConfig, Registration};
use swproxy_core::{CacheDb, CacheStorage, WorkerConfig};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = WorkerConfig::load()?;
    tracing::info!(partition = %config.partition_version, scope = %config.scope, "Starting mcp-swproxy server on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let network = FetchClient::new(FetchConfig::from(&config), config.scope_url()?)?;
    let registration = Arc::new(Registration::new(CacheStorage::new(db.clone()), Arc::new(network)));

    if let Err(e) = registration.update(config).await {
        tracing::error!(error = %e, "initial install failed, requests go straight to the network");
    }

    let handler = handler::McpSwProxyServer::new(registration.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    registration.settle().await;
    db.close().await?;

    Ok(())
}
