//! The request interceptor and its lifecycle.
//!
//! A worker generation is built from one frozen [`WorkerConfig`]. It is
//! installed (seeds its partition), activated (drops stale partitions and
//! claims open pages), and then answers intercepted requests with one of
//! three policies picked by [`Classifier`].
//!
//! Handlers are plain async functions over a [`WorkerContext`], routed
//! through a [`DispatchTable`], so every event can be driven directly from
//! tests without a host.

pub mod background;
pub mod classify;
pub mod clients;
pub mod dispatch;
pub mod lifecycle;
pub mod registration;
pub mod service_worker;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use swproxy_core::{CacheStorage, Error, Partition, WorkerConfig};
use url::Url;

use crate::fetch::Network;

pub use background::BackgroundTasks;
pub use classify::{Classifier, Strategy, UrlPattern};
pub use clients::{ClientInfo, Clients};
pub use dispatch::{DispatchTable, Event, EventKind, Handler, Outcome};
pub use lifecycle::{ActivateOutcome, InstallOutcome};
pub use registration::{Registration, UpdateOutcome};
pub use service_worker::{ServiceWorker, WorkerState};

/// Everything a handler needs for one worker generation.
///
/// Cheap to clone. The configuration is shared read-only; the partition
/// store, network and client registry are shared with other generations.
#[derive(Clone)]
pub struct WorkerContext {
    config: Arc<WorkerConfig>,
    scope: Url,
    classifier: Arc<Classifier>,
    storage: CacheStorage,
    network: Arc<dyn Network>,
    clients: Clients,
    background: BackgroundTasks,
    skip_waiting: Arc<AtomicBool>,
}

impl WorkerContext {
    /// Build a context for the generation described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the configured scope does not parse.
    pub fn new(
        config: Arc<WorkerConfig>, storage: CacheStorage, network: Arc<dyn Network>, clients: Clients,
    ) -> Result<Self, Error> {
        let scope = config.scope_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let classifier = Arc::new(Classifier::from_config(&config));

        Ok(Self {
            config,
            scope,
            classifier,
            storage,
            network,
            clients,
            background: BackgroundTasks::default(),
            skip_waiting: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Name of this generation's partition.
    pub fn version(&self) -> &str {
        &self.config.partition_version
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    /// Handle to the current partition. Does not create it; install does.
    pub fn partition(&self) -> Partition {
        self.storage.partition(self.version())
    }

    /// Ask to be activated without waiting for pages of the previous
    /// generation to close.
    pub fn request_skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::Release);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("version", &self.config.partition_version)
            .field("scope", &self.scope.as_str())
            .field("pending_writes", &self.background.pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{MockNetwork, test_config};
    use swproxy_core::CacheDb;

    #[tokio::test]
    async fn test_context_rejects_bad_scope() {
        let storage = CacheStorage::new(CacheDb::open_in_memory().await.unwrap());
        let config = Arc::new(WorkerConfig { scope: "not a url".into(), ..test_config("v1") });

        let result = WorkerContext::new(config, storage, MockNetwork::shared(), Clients::default());
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_skip_waiting_flag() {
        let storage = CacheStorage::new(CacheDb::open_in_memory().await.unwrap());
        let ctx =
            WorkerContext::new(Arc::new(test_config("v1")), storage, MockNetwork::shared(), Clients::default()).unwrap();

        assert!(!ctx.skip_waiting_requested());
        ctx.clone().request_skip_waiting();
        assert!(ctx.skip_waiting_requested());
    }
}
