//! Fixtures for tool tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rmcp::model::CallToolResult;
use swproxy_client::{Network, Registration, Request, Response};
use swproxy_core::{CacheDb, CacheStorage, Error, ResponseType, Snapshot, WorkerConfig};

/// Network answering fixed bodies for known URLs.
#[derive(Default)]
pub(crate) struct StubNetwork {
    bodies: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl StubNetwork {
    pub(crate) fn serve(&self, url: &str, body: &str) {
        self.bodies.lock().unwrap().insert(url.to_string(), body.to_string());
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| Error::Network(format!("{}: unreachable", request.url)))?;

        Response::from_snapshot(Snapshot {
            url: request.url.to_string(),
            status: 200,
            status_text: "OK".into(),
            response_type: ResponseType::Basic,
            headers: vec![("content-type".into(), b"text/html".to_vec())],
            body: body.into_bytes(),
        })
    }
}

pub(crate) fn config(version: &str) -> WorkerConfig {
    WorkerConfig {
        partition_version: version.into(),
        scope: "https://app.test/".into(),
        seed_list: vec!["./".into(), "./index.html".into()],
        bypass_patterns: vec!["api.app.test".into()],
        revalidate_patterns: vec!["https://fonts.test".into()],
        ..Default::default()
    }
}

/// Registration over an in-memory store, with the seed list served.
pub(crate) async fn registration() -> (Arc<Registration>, Arc<StubNetwork>) {
    let network = Arc::new(StubNetwork::default());
    network.serve("https://app.test/", "root");
    network.serve("https://app.test/index.html", "index");
    let storage = CacheStorage::new(CacheDb::open_in_memory().await.unwrap());
    (Arc::new(Registration::new(storage, network.clone())), network)
}

/// Text of the first content item of a tool result.
pub(crate) fn text(result: &CallToolResult) -> String {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content")
        .to_string()
}
