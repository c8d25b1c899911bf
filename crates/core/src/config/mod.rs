//! Worker configuration with layered loading.
//!
//! One configuration describes one worker generation. It is loaded once,
//! frozen behind an `Arc`, and replaced wholesale when the partition version
//! is bumped. Sources, highest precedence first:
//!
//! 1. Environment variables (SWPROXY_*)
//! 2. TOML config file (if SWPROXY_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Configuration for a single worker generation.
///
/// List values set from the environment use figment's array syntax, e.g.
/// `SWPROXY_SEED_LIST='["./", "./index.html"]'`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name of the current cache partition.
    ///
    /// Bumping it invalidates every previously seeded or filled entry on the
    /// next activation. Set via SWPROXY_PARTITION_VERSION.
    #[serde(default = "default_partition_version")]
    pub partition_version: String,

    /// Absolute URL the worker controls. Relative seed URLs resolve against
    /// it and its origin decides which responses are `basic`.
    ///
    /// Set via SWPROXY_SCOPE.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Resources stored during install, in order.
    ///
    /// Set via SWPROXY_SEED_LIST.
    #[serde(default = "default_seed_list")]
    pub seed_list: Vec<String>,

    /// Patterns forwarded to the network without touching the cache.
    ///
    /// Set via SWPROXY_BYPASS_PATTERNS.
    #[serde(default = "default_bypass_patterns")]
    pub bypass_patterns: Vec<String>,

    /// Patterns served stale-while-revalidate.
    ///
    /// Set via SWPROXY_REVALIDATE_PATTERNS.
    #[serde(default = "default_revalidate_patterns")]
    pub revalidate_patterns: Vec<String>,

    /// Path to SQLite partition store.
    ///
    /// Set via SWPROXY_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    ///
    /// Set via SWPROXY_USER_AGENT.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    ///
    /// Set via SWPROXY_TIMEOUT_MS.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted per network response.
    ///
    /// Set via SWPROXY_MAX_BYTES.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_partition_version() -> String {
    "claft-quest-map-v1.2".into()
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_seed_list() -> Vec<String> {
    vec![
        "./".into(),
        "./index.html".into(),
        "https://fonts.googleapis.com/css2?family=DotGothic16&family=M+PLUS+Rounded+1c:wght@400;700&display=swap".into(),
        "https://fonts.gstatic.com/s/dotgothic16/v18/v6-gO5dK4v7JJYAG3GLrPhiIlw.woff2".into(),
        "https://fonts.gstatic.com/s/mplusrounded1c/v21/VdGKINgfAbc4f2KI7gXwD5r_2Q.woff2".into(),
    ]
}

fn default_bypass_patterns() -> Vec<String> {
    vec!["api.adalo.com".into()]
}

fn default_revalidate_patterns() -> Vec<String> {
    vec!["https://fonts.googleapis.com".into(), "https://fonts.gstatic.com".into()]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swproxy-cache.sqlite")
}

fn default_user_agent() -> String {
    "swproxy/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            partition_version: default_partition_version(),
            scope: default_scope(),
            seed_list: default_seed_list(),
            bypass_patterns: default_bypass_patterns(),
            revalidate_patterns: default_revalidate_patterns(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl WorkerConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed scope URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `scope` is not an absolute URL.
    pub fn scope_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.scope).map_err(|e| ConfigError::Invalid { field: "scope".into(), reason: e.to_string() })
    }

    /// Copy of this configuration for the next generation.
    ///
    /// The original stays untouched; workers built from it keep serving
    /// their own partition until they are replaced.
    pub fn with_partition_version(&self, version: impl Into<String>) -> Self {
        Self { partition_version: version.into(), ..self.clone() }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWPROXY_`
    /// 2. TOML file from `SWPROXY_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWPROXY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWPROXY_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(&figment)
    }

    /// Extract and validate a configuration from an assembled figment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LoadFailed` if extraction fails, or the first
    /// validation error.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
