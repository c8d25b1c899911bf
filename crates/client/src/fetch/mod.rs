//! HTTP fetch pipeline used by the worker to reach the network.
//!
//! ### Response typing
//! - Final URL on the scope origin → `basic`
//! - Cross-origin in `no-cors` mode → `opaque` (status 0, no headers/body)
//! - Other cross-origin → `cors`
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! Non-2xx statuses are responses, not errors. Only transport failures,
//! timeouts and oversize bodies are reported as `Err`.

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use swproxy_core::{Error, ResponseType, WorkerConfig};

pub use self::url::{UrlError, resolve, same_origin};

use crate::message::{Request, RequestMode, Response};

/// Anything that can answer a request from outside the partition store.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "swproxy/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "swproxy/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&WorkerConfig> for FetchConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed network access for one scope.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    scope: ::url::Url,
}

impl FetchClient {
    /// Create a new fetch client for requests issued from `scope`.
    pub fn new(config: FetchConfig, scope: ::url::Url) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config, scope })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn response_type(&self, request: &Request, final_url: &::url::Url) -> ResponseType {
        if same_origin(&self.scope, final_url) {
            ResponseType::Basic
        } else if request.mode == RequestMode::NoCors {
            ResponseType::Opaque
        } else {
            ResponseType::Cors
        }
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        if request.mode == RequestMode::SameOrigin && !same_origin(&self.scope, &request.url) {
            return Err(Error::Network(format!("same-origin request to cross-origin URL {}", request.url)));
        }

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(format!("{}: {}", request.url, e))
                } else {
                    Error::Network(format!("{}: {}", request.url, e))
                }
            })?;

        let final_url = response.url().clone();
        let response_type = self.response_type(request, &final_url);
        if response_type == ResponseType::Opaque {
            tracing::debug!("opaque response for {}", request.url);
            return Ok(Response::opaque(final_url));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} -> {} {} in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response {
            url: final_url,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            response_type,
            headers,
            body,
        })
    }
}
