//! Response policies for intercepted requests.
//!
//! - **bypass**: network only, partition untouched.
//! - **stale-while-revalidate**: cached snapshot if any, network otherwise;
//!   ok network responses refresh the partition in the background.
//! - **cache-first**: cached snapshot if any; on a miss, fetch and store a
//!   copy when the response is a same-origin 200.
//!
//! Background writes run on the context's [`BackgroundTasks`](super::BackgroundTasks)
//! and may land after the response has been returned.

use swproxy_core::{Error, Partition, RequestKey, Snapshot};
use tokio::sync::oneshot;

use super::WorkerContext;
use super::classify::Strategy;
use crate::message::{Request, Response};

/// Classify `request` and answer it with the matching policy.
pub async fn respond(ctx: &WorkerContext, request: Request) -> Result<Response, Error> {
    let strategy = ctx.classifier().classify(&request.url);
    tracing::debug!(url = %request.url, ?strategy, "intercepted request");

    match strategy {
        Strategy::Bypass => bypass(ctx, &request).await,
        Strategy::Revalidate => stale_while_revalidate(ctx, request).await,
        Strategy::CacheFirst => cache_first(ctx, request).await,
    }
}

/// Forward to the network and return whatever comes back.
pub async fn bypass(ctx: &WorkerContext, request: &Request) -> Result<Response, Error> {
    ctx.network().fetch(request).await
}

/// Serve the cached snapshot when present while refreshing it from the
/// network.
pub async fn stale_while_revalidate(ctx: &WorkerContext, request: Request) -> Result<Response, Error> {
    let partition = ctx.partition();
    let key = request.key();
    let url = request.url.to_string();

    let (tx, rx) = oneshot::channel();
    let network = ctx.network().clone();
    let writer = partition.clone();
    ctx.background().spawn(async move {
        match network.fetch(&request).await {
            Ok(response) => {
                let key = request.key();
                let snapshot = (response.ok() && key.is_get()).then(|| response.to_snapshot());
                let _ = tx.send(Ok(response));
                if let Some(snapshot) = snapshot {
                    store(&writer, &key, &snapshot).await;
                }
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "revalidation fetch failed");
                let _ = tx.send(Err(e));
            }
        }
    });

    if let Some(cached) = lookup(&partition, &key).await {
        tracing::debug!(url = %url, "serving cached copy while revalidating");
        return Ok(cached);
    }

    match rx.await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => {
            tracing::error!(url = %url, error = %e, "fetching failed");
            Err(Error::Offline { url, reason: e.to_string() })
        }
        Err(_) => Err(Error::Offline { url, reason: "revalidation task dropped".into() }),
    }
}

/// Serve from the partition; on a miss, fetch and fill.
pub async fn cache_first(ctx: &WorkerContext, request: Request) -> Result<Response, Error> {
    let partition = ctx.partition();
    let key = request.key();

    if let Some(cached) = lookup(&partition, &key).await {
        tracing::debug!(url = %request.url, "cache hit");
        return Ok(cached);
    }

    let response = match ctx.network().fetch(&request).await {
        Ok(response) => response,
        Err(e) => {
            // Offline page fallback would go here; none is served.
            tracing::error!(url = %request.url, error = %e, "fetching failed");
            return Err(Error::Offline { url: request.url.to_string(), reason: e.to_string() });
        }
    };

    if !response.is_cacheable() || !key.is_get() {
        return Ok(response);
    }

    let snapshot = response.to_snapshot();
    ctx.background().spawn(async move {
        store(&partition, &key, &snapshot).await;
    });

    Ok(response)
}

/// Cached response for `key`. Store errors are logged and read as a miss.
async fn lookup(partition: &Partition, key: &RequestKey) -> Option<Response> {
    match partition.match_request(key).await {
        Ok(Some(snapshot)) => match Response::from_snapshot(snapshot) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(partition = partition.name(), url = %key.url, error = %e, "unreadable cache entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(partition = partition.name(), url = %key.url, error = %e, "cache lookup failed");
            None
        }
    }
}

async fn store(partition: &Partition, key: &RequestKey, snapshot: &Snapshot) {
    if let Err(e) = partition.put(key, snapshot).await {
        tracing::warn!(partition = partition.name(), url = %key.url, error = %e, "cache write failed");
    }
}
