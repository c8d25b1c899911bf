//! Registry of open pages and the generation controlling each.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::message::ClientId;

/// An open page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: String,
    /// Partition version of the controlling worker, if any.
    pub controller: Option<String>,
    pub opened_at: String,
}

/// Open pages shared by every worker generation of a registration.
#[derive(Debug, Clone, Default)]
pub struct Clients {
    pages: Arc<RwLock<BTreeMap<ClientId, ClientInfo>>>,
    next_id: Arc<AtomicU64>,
}

impl Clients {
    /// Record a newly opened page, controlled by `controller` if given.
    pub async fn open(&self, url: &Url, controller: Option<&str>) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let info = ClientInfo {
            id,
            url: url.to_string(),
            controller: controller.map(str::to_string),
            opened_at: chrono::Utc::now().to_rfc3339(),
        };
        self.pages.write().await.insert(id, info);
        id
    }

    /// Forget a page. Returns whether it was open.
    pub async fn close(&self, id: ClientId) -> bool {
        self.pages.write().await.remove(&id).is_some()
    }

    pub async fn get(&self, id: ClientId) -> Option<ClientInfo> {
        self.pages.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<ClientInfo> {
        self.pages.read().await.values().cloned().collect()
    }

    /// Put every open page under `version`. Returns how many pages changed
    /// controller.
    pub async fn claim(&self, version: &str) -> usize {
        let mut pages = self.pages.write().await;
        let mut claimed = 0;
        for info in pages.values_mut() {
            if info.controller.as_deref() != Some(version) {
                info.controller = Some(version.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    /// Pages currently controlled by `version`.
    pub async fn controlled_by(&self, version: &str) -> usize {
        self.pages
            .read()
            .await
            .values()
            .filter(|info| info.controller.as_deref() == Some(version))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(path: &str) -> Url {
        Url::parse("https://app.test/").unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_open_and_close() {
        let clients = Clients::default();
        let a = clients.open(&page("./"), None).await;
        let b = clients.open(&page("./map.html"), Some("v1")).await;

        assert_ne!(a, b);
        assert_eq!(clients.list().await.len(), 2);
        assert_eq!(clients.get(b).await.unwrap().controller.as_deref(), Some("v1"));

        assert!(clients.close(a).await);
        assert!(!clients.close(a).await);
        assert!(clients.get(a).await.is_none());
    }

    #[tokio::test]
    async fn test_claim_takes_every_page() {
        let clients = Clients::default();
        clients.open(&page("./"), None).await;
        clients.open(&page("./a"), Some("v1")).await;
        clients.open(&page("./b"), Some("v2")).await;

        assert_eq!(clients.claim("v2").await, 2);
        assert_eq!(clients.controlled_by("v2").await, 3);
        assert_eq!(clients.controlled_by("v1").await, 0);
        assert_eq!(clients.claim("v2").await, 0);
    }
}
