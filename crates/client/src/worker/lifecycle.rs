//! Install and activate handlers.
//!
//! Install seeds the generation's partition from the configured seed list,
//! all or nothing. Activate deletes every other partition and claims the
//! open pages.

use std::collections::HashSet;

use futures_util::future::try_join_all;
use serde::Serialize;
use swproxy_core::Error;

use super::WorkerContext;
use crate::fetch::resolve;
use crate::message::Request;

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    /// Partition that was seeded.
    pub partition: String,
    /// Number of seed resources stored.
    pub seeded: usize,
    /// The worker asked to activate without waiting.
    pub skip_waiting: bool,
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateOutcome {
    /// Partition that remains.
    pub partition: String,
    /// Partitions removed, in store order.
    pub deleted: Vec<String>,
    /// Pages that switched to this generation.
    pub claimed: usize,
}

/// Seed the current partition.
///
/// Every seed is fetched before anything is written; a single failed or
/// non-ok fetch rejects the whole install and stores nothing.
pub async fn install(ctx: &WorkerContext) -> Result<InstallOutcome, Error> {
    ctx.request_skip_waiting();

    let version = ctx.version();
    let requests = seed_requests(ctx)?;

    let partition = ctx.storage().open(version).await?;
    tracing::info!(partition = version, "opened cache");

    let fetches = requests.iter().map(|request| async move {
        let response = ctx.network().fetch(request).await.map_err(|e| Error::SetupFailed {
            url: request.url.to_string(),
            reason: e.to_string(),
        })?;

        if !response.ok() {
            return Err(Error::SetupFailed { url: request.url.to_string(), reason: format!("status {}", response.status) });
        }

        Ok((request.key(), response.to_snapshot()))
    });

    let entries = match try_join_all(fetches).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(partition = version, error = %e, "failed to seed cache");
            return Err(e);
        }
    };

    let seeded = partition.put_all(entries).await.map_err(|e| {
        tracing::error!(partition = version, error = %e, "failed to store seed resources");
        Error::SetupFailed { url: version.to_string(), reason: e.to_string() }
    })?;

    tracing::info!(partition = version, seeded, "seeded cache");

    Ok(InstallOutcome { partition: version.to_string(), seeded, skip_waiting: ctx.skip_waiting_requested() })
}

/// Drop every partition but the current one and take control of all pages.
pub async fn activate(ctx: &WorkerContext) -> Result<ActivateOutcome, Error> {
    let version = ctx.version();
    let stale: Vec<String> = ctx.storage().keys().await?.into_iter().filter(|name| name != version).collect();

    let deletions = stale.iter().map(|name| async move {
        tracing::info!(partition = %name, "deleting old cache");
        ctx.storage().delete(name).await.map(|_| name.clone())
    });
    let deleted = try_join_all(deletions).await?;

    let claimed = ctx.clients().claim(version).await;
    tracing::info!(partition = version, deleted = deleted.len(), claimed, "activated");

    Ok(ActivateOutcome { partition: version.to_string(), deleted, claimed })
}

/// Seed list resolved against the scope. Duplicates are rejected.
fn seed_requests(ctx: &WorkerContext) -> Result<Vec<Request>, Error> {
    let mut seen = HashSet::new();
    let mut requests = Vec::with_capacity(ctx.config().seed_list.len());

    for seed in &ctx.config().seed_list {
        let url = resolve(ctx.scope(), seed).map_err(|e| Error::InvalidUrl(format!("{seed}: {e}")))?;
        if !seen.insert(url.clone()) {
            return Err(Error::SetupFailed { url: url.to_string(), reason: "duplicate seed resource".into() });
        }
        requests.push(Request::get(url));
    }

    Ok(requests)
}
