use async_trait::async_trait;
use errors::TransportError;
use parking_lot::Mutex;
use rc_core::Transport;
use reqwest::Url;
use std::collections::HashSet;
use std::sync::Arc;

/// Wraps a transport and fails config fetches of selected namespaces with
/// HTTP 503. Notification requests always pass through.
pub struct FaultyTransport {
    inner: Arc<dyn Transport>,
    failing: Mutex<HashSet<String>>
}

impl FaultyTransport {
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new())
        }
    }

    pub fn fail_config_fetches(&self, namespace: &str) {
        self.failing.lock().insert(namespace.to_string());
    }

    pub fn heal_config_fetches(&self, namespace: &str) {
        self.failing.lock().remove(namespace);
    }

    fn fetched_namespace(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let segments: Vec<String> = parsed
            .path_segments()?
            .map(String::from)
            .collect();
        match segments.as_slice() {
            [configs, _app, _cluster, namespace] if configs == "configs" => Some(namespace.clone()),
            _ => None
        }
    }
}

#[async_trait]
impl Transport for FaultyTransport {
    async fn request(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        if let Some(namespace) = Self::fetched_namespace(url) {
            if self.failing.lock().contains(&namespace) {
                return Err(TransportError::Status {
                    url: url.to_string(),
                    status: 503
                });
            }
        }
        self.inner.request(url).await
    }
}
