//! Request classification.
//!
//! Pure mapping from a request URL to the policy that answers it. Bypass
//! patterns are consulted first, then revalidate patterns; anything else is
//! cache-first.

use serde::{Deserialize, Serialize};
use swproxy_core::WorkerConfig;
use url::Url;

/// Response policy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Network only; the partition is never read or written.
    Bypass,
    /// Stale-while-revalidate.
    Revalidate,
    /// Cache-first with fill on miss.
    CacheFirst,
}

/// One configured URL pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPattern {
    /// Matches URLs whose serialization starts with the prefix.
    Prefix(String),
    /// Matches the host and all of its subdomains.
    Host(String),
}

impl UrlPattern {
    /// Patterns containing `://` are URL prefixes; bare names are hosts.
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim();
        if pattern.contains("://") {
            UrlPattern::Prefix(pattern.to_string())
        } else {
            UrlPattern::Host(pattern.trim_matches('.').to_ascii_lowercase())
        }
    }

    pub fn matches(&self, url: &Url) -> bool {
        match self {
            UrlPattern::Prefix(prefix) => url.as_str().starts_with(prefix.as_str()),
            UrlPattern::Host(host) => url
                .host_str()
                .is_some_and(|h| h == host || h.strip_suffix(host.as_str()).is_some_and(|rest| rest.ends_with('.'))),
        }
    }
}

/// Fixed pattern sets for one worker generation.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    bypass: Vec<UrlPattern>,
    revalidate: Vec<UrlPattern>,
}

impl Classifier {
    pub fn new<B, R>(bypass: B, revalidate: R) -> Self
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        Self {
            bypass: bypass.into_iter().map(|p| UrlPattern::parse(p.as_ref())).collect(),
            revalidate: revalidate.into_iter().map(|p| UrlPattern::parse(p.as_ref())).collect(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(&config.bypass_patterns, &config.revalidate_patterns)
    }

    pub fn classify(&self, url: &Url) -> Strategy {
        if self.bypass.iter().any(|p| p.matches(url)) {
            Strategy::Bypass
        } else if self.revalidate.iter().any(|p| p.matches(url)) {
            Strategy::Revalidate
        } else {
            Strategy::CacheFirst
        }
    }
}
