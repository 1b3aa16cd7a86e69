//! # Client Configuration Structures
//!
//! Connection parameters for the remote configuration client.
//!
//! All configuration structures:
//! - Use `serde` with camelCase names so existing bootstrap files load as-is
//! - Use `validator` for input validation

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Bootstrap configuration for one client instance.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Identifies the application and cluster on the configuration server, the
/// namespaces to replicate, where to keep the on-disk snapshot, and the
/// timing of the long-poll driver.
///
/// ## Usage
/// ```rust,no_run
/// use config::ClientConfig;
///
/// let config = ClientConfig::new("order-service", "config.internal:8080");
/// assert_eq!(config.cluster, "default");
/// assert_eq!(config.namespace_names, vec!["application".to_string()]);
/// ```
///
/// ## Fields
/// - `app_id`: Application id registered on the server
/// - `cluster`: Cluster name (default: "default")
/// - `namespace_names`: Namespaces preloaded at start (default: ["application"])
/// - `ip`: Server address, with or without scheme
/// - `cache_dir`: Directory holding the snapshot file (default: ".config_cache")
/// - `client_ip`: Optional address reported to the server on config fetches
/// - `long_poll_timeout_seconds`: Client timeout for held notification requests
///   (default: 90; must exceed the server's 60s hold)
/// - `query_timeout_seconds`: Timeout for config fetches (default: 2)
/// - `delivery_queue_capacity`: Bounded change-event queue size (default: 32)
/// - `retry`: Backoff applied after long-poll transport errors
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(alias = "appID")]
    #[validate(length(min = 1, max = 255))]
    pub app_id: String,

    #[serde(default = "default_cluster")]
    #[validate(length(min = 1, max = 255))]
    pub cluster: String,

    #[serde(default = "default_namespace_names")]
    #[validate(custom(function = "validate_namespace_names"))]
    pub namespace_names: Vec<String>,

    #[serde(alias = "server")]
    #[validate(length(min = 1, max = 2048))]
    pub ip: String,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default)]
    pub client_ip: Option<String>,

    #[serde(default = "default_long_poll_timeout_seconds")]
    #[validate(range(min = 61, max = 600))]
    pub long_poll_timeout_seconds: u64,

    #[serde(default = "default_query_timeout_seconds")]
    #[validate(range(min = 1, max = 60))]
    pub query_timeout_seconds: u64,

    #[serde(default = "default_delivery_queue_capacity")]
    #[validate(range(min = 1, max = 4096))]
    pub delivery_queue_capacity: usize,

    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig
}

impl ClientConfig {
    pub fn new(app_id: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ip: ip.into(),
            ..Self::default()
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        self.namespace_names = namespaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Server base URL with a scheme and without a trailing slash.
    pub fn server_url(&self) -> String {
        let ip = self.ip.trim().trim_end_matches('/');
        if ip.starts_with("http://") || ip.starts_with("https://") {
            ip.to_string()
        } else {
            format!("http://{ip}")
        }
    }

    /// Snapshot file for this (app id, cluster) pair.
    pub fn dump_file_path(&self) -> PathBuf {
        self.cache_dir
            .join(format!(".{}_{}", self.app_id, self.cluster))
    }

    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.long_poll_timeout_seconds)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            cluster: default_cluster(),
            namespace_names: default_namespace_names(),
            ip: String::new(),
            cache_dir: default_cache_dir(),
            client_ip: None,
            long_poll_timeout_seconds: default_long_poll_timeout_seconds(),
            query_timeout_seconds: default_query_timeout_seconds(),
            delivery_queue_capacity: default_delivery_queue_capacity(),
            retry: RetryConfig::default()
        }
    }
}

/// Backoff applied by the long-poll driver after transport errors.
///
/// ## Fields
/// - `initial_backoff_ms`: First delay after an error (default: 1000)
/// - `max_backoff_ms`: Upper bound for the exponential delay (default: 60000)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_initial_backoff_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub max_backoff_ms: u64
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms()
        }
    }
}

fn default_cluster() -> String {
    "default".to_string()
}

fn default_namespace_names() -> Vec<String> {
    vec![rc_core::DEFAULT_NAMESPACE.to_string()]
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".config_cache")
}

fn default_long_poll_timeout_seconds() -> u64 {
    90
}

fn default_query_timeout_seconds() -> u64 {
    2
}

fn default_delivery_queue_capacity() -> usize {
    32
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60000
}

fn validate_namespace_names(names: &[String]) -> Result<(), validator::ValidationError> {
    if names.iter().any(|name| name.trim().is_empty()) {
        return Err(validator::ValidationError::new("empty_namespace_name"));
    }
    Ok(())
}
