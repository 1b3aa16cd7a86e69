use config::ClientConfig;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

pub fn unique_app_id() -> String {
    unique_id("test-app")
}

/// Client configuration with a unique app id, pointing at a mock server and
/// keeping its snapshot under `cache_dir`.
pub fn client_config(cache_dir: &Path, namespaces: &[&str]) -> ClientConfig {
    let mut config = ClientConfig::new(unique_app_id(), "mock.config.local")
        .with_cache_dir(cache_dir)
        .with_namespaces(namespaces.iter().copied());
    config.retry.initial_backoff_ms = 10;
    config.retry.max_backoff_ms = 50;
    config
}
