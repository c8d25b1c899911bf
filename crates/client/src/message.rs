//! Request and response values passed between the host, the worker and the
//! network.

use std::str::FromStr;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use swproxy_core::{Error, RequestKey, ResponseType, Snapshot};
use url::Url;

pub use reqwest::Method;

/// Identifier of an open page.
pub type ClientId = u64;

/// How cross-origin requests are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    /// Cross-origin targets are refused.
    SameOrigin,
    /// Cross-origin responses come back opaque.
    NoCors,
    /// Cross-origin responses are readable.
    #[default]
    Cors,
}

impl FromStr for RequestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "no-cors" => Ok(RequestMode::NoCors),
            "cors" => Ok(RequestMode::Cors),
            other => Err(Error::InvalidInput(format!("unknown request mode: {other}"))),
        }
    }
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub mode: RequestMode,
    /// Page that issued the request, if known.
    pub client_id: Option<ClientId>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), mode: RequestMode::default(), client_id: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Cache identity: method plus URL without fragment.
    pub fn key(&self) -> RequestKey {
        let mut url = self.url.clone();
        url.set_fragment(None);
        RequestKey::new(self.method.as_str(), url.as_str())
    }
}

/// A response, either from the network or replayed from a partition.
///
/// Cloning shares the body buffer, so a response can be handed to the
/// caller and stored at the same time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Opaque stand-in for a cross-origin `no-cors` response.
    pub fn opaque(url: Url) -> Self {
        Self {
            url,
            status: 0,
            status_text: String::new(),
            response_type: ResponseType::Opaque,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Status in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Exactly 200 and same-origin. Errors, redirects and opaque or
    /// cross-origin responses fail this check.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            url: self.url.to_string(),
            status: self.status,
            status_text: self.status_text.clone(),
            response_type: self.response_type,
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
                .collect(),
            body: self.body.to_vec(),
        }
    }

    /// Rebuild a response from a stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::CorruptEntry` if the stored URL or a header does not
    /// parse.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, Error> {
        let url = Url::parse(&snapshot.url).map_err(|e| Error::CorruptEntry(format!("{}: {e}", snapshot.url)))?;

        let mut headers = HeaderMap::with_capacity(snapshot.headers.len());
        for (name, value) in snapshot.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            let value = HeaderValue::from_bytes(&value).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            headers.append(name, value);
        }

        Ok(Self {
            url,
            status: snapshot.status,
            status_text: snapshot.status_text,
            response_type: snapshot.response_type,
            headers,
            body: Bytes::from(snapshot.body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header;

    #[test]
    fn test_request_mode_from_str() {
        assert_eq!("no-cors".parse::<RequestMode>().unwrap(), RequestMode::NoCors);
        assert_eq!("same-origin".parse::<RequestMode>().unwrap(), RequestMode::SameOrigin);
        assert!(matches!("opaque".parse::<RequestMode>(), Err(Error::InvalidInput(_))));
    }

    fn html_response(status: u16, response_type: ResponseType) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        Response {
            url: Url::parse("https://app.test/index.html").unwrap(),
            status,
            status_text: "OK".into(),
            response_type,
            headers,
            body: Bytes::from_static(b"<h1>quest</h1>"),
        }
    }

    #[test]
    fn test_key_ignores_fragment_and_body() {
        let request = Request::get(Url::parse("https://app.test/index.html#map").unwrap());
        let key = request.key();
        assert_eq!(key.method, "GET");
        assert_eq!(key.url, "https://app.test/index.html");
    }

    #[test]
    fn test_snapshot_preserves_multi_value_headers() {
        let response = html_response(200, ResponseType::Basic);
        let restored = Response::from_snapshot(response.to_snapshot()).unwrap();
        assert_eq!(restored, response);
        assert_eq!(restored.headers.get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_snapshot_keeps_non_utf8_header_bytes() {
        let mut response = html_response(200, ResponseType::Basic);
        response.headers.insert("x-title", HeaderValue::from_bytes(b"caf\xe9").unwrap());

        let restored = Response::from_snapshot(response.to_snapshot()).unwrap();

        assert_eq!(restored.headers["x-title"].as_bytes(), b"caf\xe9");
        assert_eq!(restored, response);
    }

    #[test]
    fn test_cacheable_requires_200_basic() {
        assert!(html_response(200, ResponseType::Basic).is_cacheable());
        assert!(!html_response(204, ResponseType::Basic).is_cacheable());
        assert!(!html_response(404, ResponseType::Basic).is_cacheable());
        assert!(!html_response(200, ResponseType::Cors).is_cacheable());
        assert!(!Response::opaque(Url::parse("https://cdn.test/x").unwrap()).is_cacheable());
    }

    #[test]
    fn test_ok_range() {
        assert!(html_response(204, ResponseType::Cors).ok());
        assert!(!html_response(304, ResponseType::Basic).ok());
        assert!(!Response::opaque(Url::parse("https://cdn.test/x").unwrap()).ok());
    }

    #[test]
    fn test_from_snapshot_rejects_bad_url() {
        let mut snapshot = html_response(200, ResponseType::Basic).to_snapshot();
        snapshot.url = "not a url".into();
        assert!(matches!(Response::from_snapshot(snapshot), Err(Error::CorruptEntry(_))));
    }
}
