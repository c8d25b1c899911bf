//! Scripted network and fixtures for worker tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use swproxy_core::{CacheDb, CacheStorage, Error, ResponseType, WorkerConfig};
use url::Url;

use super::{Clients, WorkerContext};
use crate::fetch::{Network, same_origin};
use crate::message::{Request, RequestMode, Response};

pub(crate) const SCOPE: &str = "https://app.test/";

#[derive(Clone)]
enum Route {
    Respond { status: u16, body: Bytes, delay: Option<Duration> },
    Fail(String),
}

/// Network double answering from a route table and recording every call.
#[derive(Default)]
pub(crate) struct MockNetwork {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
}

impl MockNetwork {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: &str) {
        self.route(url, Route::Respond { status, body: Bytes::copy_from_slice(body.as_bytes()), delay: None });
    }

    pub(crate) fn respond_after(&self, url: &str, delay: Duration, body: &str) {
        self.route(url, Route::Respond { status: 200, body: Bytes::copy_from_slice(body.as_bytes()), delay: Some(delay) });
    }

    pub(crate) fn fail(&self, url: &str) {
        self.route(url, Route::Fail("connection refused".into()));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == url).count()
    }

    fn route(&self, url: &str, route: Route) {
        self.routes.lock().unwrap().insert(url.to_string(), route);
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.as_str().to_string();
        self.calls.lock().unwrap().push(url.clone());
        let route = self.routes.lock().unwrap().get(&url).cloned();

        let (status, body, delay) = match route {
            Some(Route::Respond { status, body, delay }) => (status, body, delay),
            Some(Route::Fail(reason)) => return Err(Error::Network(format!("{url}: {reason}"))),
            None => return Err(Error::Network(format!("{url}: no route"))),
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scope = Url::parse(SCOPE).unwrap();
        let response_type = if same_origin(&scope, &request.url) {
            ResponseType::Basic
        } else if request.mode == RequestMode::NoCors {
            return Ok(Response::opaque(request.url.clone()));
        } else {
            ResponseType::Cors
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));

        Ok(Response {
            url: request.url.clone(),
            status,
            status_text: String::new(),
            response_type,
            headers,
            body,
        })
    }
}

pub(crate) fn test_config(version: &str) -> WorkerConfig {
    WorkerConfig {
        partition_version: version.into(),
        scope: SCOPE.into(),
        seed_list: vec!["./".into(), "./index.html".into()],
        bypass_patterns: vec!["api.app.test".into()],
        revalidate_patterns: vec!["https://fonts.test".into()],
        ..Default::default()
    }
}

pub(crate) async fn test_storage() -> CacheStorage {
    CacheStorage::new(CacheDb::open_in_memory().await.unwrap())
}

pub(crate) fn context_with(
    config: WorkerConfig, storage: &CacheStorage, network: &Arc<MockNetwork>, clients: &Clients,
) -> WorkerContext {
    WorkerContext::new(Arc::new(config), storage.clone(), network.clone(), clients.clone()).unwrap()
}

/// Context for `version` over a fresh in-memory store, with the seed list
/// routed to 200 responses.
pub(crate) async fn seeded_context(version: &str) -> (WorkerContext, Arc<MockNetwork>) {
    let network = MockNetwork::shared();
    network.respond("https://app.test/", 200, "root");
    network.respond("https://app.test/index.html", 200, "index");
    let storage = test_storage().await;
    let ctx = context_with(test_config(version), &storage, &network, &Clients::default());
    (ctx, network)
}

pub(crate) fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}
