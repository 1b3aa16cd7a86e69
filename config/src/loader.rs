//! # Environment Variable Loader
//!
//! Overlays client settings from environment variables following 12-factor
//! app principles.
//!
//! # Naming Convention
//! - `RC_APP_ID`: Application id
//! - `RC_CLUSTER`: Cluster name
//! - `RC_NAMESPACES`: Comma separated namespace list
//! - `RC_SERVER`: Server address
//! - `RC_CACHE_DIR`: Snapshot directory
//! - `RC_CLIENT_IP`: Address reported on config fetches
//! - `RC_LONG_POLL_TIMEOUT_SECONDS`: Long-poll client timeout
//! - `RC_QUERY_TIMEOUT_SECONDS`: Config fetch timeout

use crate::config::ClientConfig;
use std::env;

/// Load configuration from environment variables on top of defaults.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Builds a `ClientConfig` purely from the environment. Unset variables keep
/// their default value; malformed numeric variables are reported.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_env()?;
///     println!("server: {}", config.server_url());
///     Ok(())
/// }
/// ```
pub fn load_from_env() -> Result<ClientConfig, Box<dyn std::error::Error>> {
    apply_env_overrides(ClientConfig::default())
}

/// Override fields of `base` with any `RC_*` variables that are set.
pub fn apply_env_overrides(
    mut base: ClientConfig
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    if let Ok(app_id) = env::var("RC_APP_ID") {
        base.app_id = app_id;
    }
    if let Ok(cluster) = env::var("RC_CLUSTER") {
        base.cluster = cluster;
    }
    if let Ok(namespaces) = env::var("RC_NAMESPACES") {
        base.namespace_names = namespaces
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Ok(server) = env::var("RC_SERVER") {
        base.ip = server;
    }
    if let Ok(cache_dir) = env::var("RC_CACHE_DIR") {
        base.cache_dir = cache_dir.into();
    }
    if let Ok(client_ip) = env::var("RC_CLIENT_IP") {
        base.client_ip = Some(client_ip);
    }
    if let Some(timeout) = parse_env("RC_LONG_POLL_TIMEOUT_SECONDS")? {
        base.long_poll_timeout_seconds = timeout;
    }
    if let Some(timeout) = parse_env("RC_QUERY_TIMEOUT_SECONDS")? {
        base.query_timeout_seconds = timeout;
    }

    Ok(base)
}

fn parse_env<T>(key: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(_) => Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "RC_APP_ID",
        "RC_CLUSTER",
        "RC_NAMESPACES",
        "RC_SERVER",
        "RC_CACHE_DIR",
        "RC_CLIENT_IP",
        "RC_LONG_POLL_TIMEOUT_SECONDS",
        "RC_QUERY_TIMEOUT_SECONDS",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_load_from_env_defaults() {
        clear_env();
        let config = load_from_env().unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_from_env_overrides() {
        clear_env();
        unsafe {
            env::set_var("RC_APP_ID", "billing");
            env::set_var("RC_NAMESPACES", "application, db.yaml ,,");
            env::set_var("RC_SERVER", "cfg:8080");
            env::set_var("RC_LONG_POLL_TIMEOUT_SECONDS", "120");
        }

        let config = load_from_env().unwrap();
        assert_eq!(config.app_id, "billing");
        assert_eq!(config.namespace_names, vec!["application", "db.yaml"]);
        assert_eq!(config.ip, "cfg:8080");
        assert_eq!(config.long_poll_timeout_seconds, 120);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_apply_env_overrides_keeps_file_values() {
        clear_env();
        unsafe {
            env::set_var("RC_CLUSTER", "staging");
        }

        let base = ClientConfig::new("orders", "file-host:8080");
        let config = apply_env_overrides(base).unwrap();
        assert_eq!(config.app_id, "orders");
        assert_eq!(config.ip, "file-host:8080");
        assert_eq!(config.cluster, "staging");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_from_env_invalid_number() {
        clear_env();
        unsafe {
            env::set_var("RC_QUERY_TIMEOUT_SECONDS", "soon");
        }

        assert!(load_from_env().is_err());

        clear_env();
    }
}
