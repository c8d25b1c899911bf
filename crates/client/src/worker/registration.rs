//! Registration: the active and waiting worker generations for one scope.

use std::sync::Arc;

use serde::Serialize;
use swproxy_core::{CacheStorage, Error, WorkerConfig};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::WorkerContext;
use super::clients::Clients;
use super::dispatch::DispatchTable;
use super::lifecycle::{ActivateOutcome, InstallOutcome};
use super::service_worker::ServiceWorker;
use crate::fetch::Network;
use crate::message::{ClientId, Request, Response};

/// What an update ended in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum UpdateOutcome {
    /// Installed and took over immediately.
    Activated { install: InstallOutcome, activate: ActivateOutcome },
    /// Installed, waiting for the pages of the current generation to close.
    Waiting { install: InstallOutcome },
}

/// Owns the worker generations of a scope and routes requests to the
/// active one.
///
/// At most one generation is active; requests never see a mix of two.
pub struct Registration {
    storage: CacheStorage,
    network: Arc<dyn Network>,
    clients: Clients,
    active: RwLock<Option<Arc<ServiceWorker>>>,
    waiting: RwLock<Option<Arc<ServiceWorker>>>,
    transitions: Mutex<()>,
}

impl Registration {
    pub fn new(storage: CacheStorage, network: Arc<dyn Network>) -> Self {
        Self {
            storage,
            network,
            clients: Clients::default(),
            active: RwLock::new(None),
            waiting: RwLock::new(None),
            transitions: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.active.read().await.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<ServiceWorker>> {
        self.waiting.read().await.clone()
    }

    /// Install a new generation from `config` with the default handlers.
    pub async fn update(&self, config: WorkerConfig) -> Result<UpdateOutcome, Error> {
        self.update_with(config, DispatchTable::default()).await
    }

    /// Install a new generation from `config` using `table`.
    ///
    /// A failed install leaves the current generation in charge. A
    /// successful one activates right away if it asked to skip waiting or
    /// no page is controlled by the current generation; otherwise it waits.
    ///
    /// # Errors
    ///
    /// Returns the install or activate error of the new generation.
    pub async fn update_with(&self, config: WorkerConfig, table: DispatchTable) -> Result<UpdateOutcome, Error> {
        let _transition = self.transitions.lock().await;

        let ctx = WorkerContext::new(Arc::new(config), self.storage.clone(), self.network.clone(), self.clients.clone())?;
        let worker = Arc::new(ServiceWorker::with_table(ctx, table));
        let version = worker.version().to_string();

        let install = match worker.install().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(partition = %version, error = %e, "install failed, keeping current worker");
                return Err(e);
            }
        };
        tracing::info!(partition = %version, seeded = install.seeded, "installed worker");

        if let Some(replaced) = self.waiting.write().await.take() {
            tracing::debug!(partition = replaced.version(), "replacing waiting worker");
            replaced.mark_redundant();
        }

        if self.may_activate(&worker).await {
            let activate = self.promote(worker).await?;
            Ok(UpdateOutcome::Activated { install, activate })
        } else {
            tracing::info!(partition = %version, "worker waiting for pages to close");
            *self.waiting.write().await = Some(worker);
            Ok(UpdateOutcome::Waiting { install })
        }
    }

    /// Activate the waiting generation if nothing holds it back any more.
    pub async fn try_activate_waiting(&self) -> Result<Option<ActivateOutcome>, Error> {
        let _transition = self.transitions.lock().await;

        let Some(worker) = self.waiting().await else {
            return Ok(None);
        };
        if !self.may_activate(&worker).await {
            return Ok(None);
        }

        self.waiting.write().await.take();
        self.promote(worker).await.map(Some)
    }

    /// Answer `request` through the active generation, or straight from the
    /// network when there is none.
    ///
    /// A request carrying a client id is routed by that page: a page no
    /// generation controls goes to the network.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a client id that is not open.
    pub async fn fetch(&self, request: Request) -> Result<Response, Error> {
        if let Some(id) = request.client_id {
            let page = self.clients.get(id).await.ok_or_else(|| Error::InvalidInput(format!("unknown client {id}")))?;
            if page.controller.is_none() {
                tracing::debug!(client = id, url = %request.url, "uncontrolled page, going to network");
                return self.network.fetch(&request).await;
            }
        }

        match self.active().await {
            Some(worker) => worker.fetch(request).await,
            None => self.network.fetch(&request).await,
        }
    }

    /// Open a page under the active generation.
    pub async fn open_client(&self, url: &Url) -> ClientId {
        let active = self.active().await;
        self.clients.open(url, active.as_ref().map(|w| w.version())).await
    }

    /// Close a page, then activate a waiting generation if that freed it.
    pub async fn close_client(&self, id: ClientId) -> Result<bool, Error> {
        let closed = self.clients.close(id).await;
        if closed {
            self.try_activate_waiting().await?;
        }
        Ok(closed)
    }

    /// Wait for background cache writes of the active generation.
    pub async fn settle(&self) {
        if let Some(worker) = self.active().await {
            worker.context().background().settle().await;
        }
    }

    async fn may_activate(&self, worker: &ServiceWorker) -> bool {
        if worker.skip_waiting_requested() {
            return true;
        }
        match self.active().await {
            Some(current) => self.clients.controlled_by(current.version()).await == 0,
            None => true,
        }
    }

    /// Swap `worker` in.
    ///
    /// Pending writes of the previous generation are awaited before the
    /// write lock is taken, so requests keep flowing meanwhile. Requests
    /// arriving during activation wait on the lock; one already handed to
    /// the previous generation may finish after its partition is gone, and
    /// its late write is refused by the store.
    async fn promote(&self, worker: Arc<ServiceWorker>) -> Result<ActivateOutcome, Error> {
        if let Some(previous) = self.active().await {
            previous.context().background().settle().await;
        }

        let mut active = self.active.write().await;
        let outcome = worker.activate().await?;
        if let Some(previous) = active.replace(worker) {
            previous.mark_redundant();
        }

        Ok(outcome)
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("clients", &self.clients).finish_non_exhaustive()
    }
}
