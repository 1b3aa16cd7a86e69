use async_trait::async_trait;
use errors::TransportError;
use parking_lot::Mutex;
use rc_core::Transport;
use reqwest::Url;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Default)]
struct NamespaceState {
    configurations: Map<String, Value>,
    release: u64,
    notification_id: i64
}

impl NamespaceState {
    fn release_key(&self) -> String {
        format!("release-{}", self.release)
    }
}

/// In-memory configuration server speaking the config and notification
/// endpoints through the `Transport` capability.
///
/// Every mutation publishes a new release and bumps the namespace's
/// notification id, waking held long polls. Unknown namespaces answer 404.
pub struct MockConfigServer {
    namespaces: Mutex<HashMap<String, NamespaceState>>,
    changed: Notify,
    hold: Duration,
    offline: AtomicBool,
    requests: Mutex<Vec<String>>
}

impl Default for MockConfigServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConfigServer {
    pub fn new() -> Self {
        Self::with_hold(Duration::from_secs(60))
    }

    /// A server that answers "not modified" after holding a long poll for
    /// `hold` without changes.
    pub fn with_hold(hold: Duration) -> Self {
        Self {
            namespaces: Mutex::new(HashMap::new()),
            changed: Notify::new(),
            hold,
            offline: AtomicBool::new(false),
            requests: Mutex::new(Vec::new())
        }
    }

    /// Publishes an empty namespace.
    pub fn create_namespace(&self, namespace: &str) {
        self.mutate(namespace, |_| {});
    }

    pub fn set(&self, namespace: &str, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.mutate(namespace, move |configurations| {
            configurations.insert(key.to_string(), value);
        });
    }

    pub fn delete(&self, namespace: &str, key: &str) {
        self.mutate(namespace, |configurations| {
            configurations.remove(key);
        });
    }

    /// Sets the document of a yml, yaml or json namespace.
    pub fn set_content(&self, namespace: &str, content: &str) {
        self.set(namespace, "content", content);
    }

    /// While offline every request fails like a refused connection.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn release_key(&self, namespace: &str) -> Option<String> {
        self.namespaces
            .lock()
            .get(namespace)
            .map(NamespaceState::release_key)
    }

    /// Every URL requested so far, including failed ones.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Config fetch URLs requested for `namespace`.
    pub fn config_requests(&self, namespace: &str) -> Vec<String> {
        let marker = format!("/{namespace}?");
        self.requests()
            .into_iter()
            .filter(|url| url.contains("/configs/") && url.contains(&marker))
            .collect()
    }

    fn mutate<F>(&self, namespace: &str, change: F)
    where
        F: FnOnce(&mut Map<String, Value>)
    {
        {
            let mut namespaces = self.namespaces.lock();
            let state = namespaces.entry(namespace.to_string()).or_default();
            change(&mut state.configurations);
            state.release += 1;
            state.notification_id += 1;
        }
        self.changed.notify_waiters();
    }

    fn fetch_config(&self, url: &str, namespace: &str, release_key: &str) -> Result<Vec<u8>, TransportError> {
        let namespaces = self.namespaces.lock();
        let state = namespaces.get(namespace).ok_or_else(|| TransportError::Status {
            url: url.to_string(),
            status: 404
        })?;

        if state.release_key() == release_key {
            return Ok(Vec::new());
        }

        let body = json!({
            "namespaceName": namespace,
            "configurations": state.configurations,
            "releaseKey": state.release_key()
        });
        Ok(body.to_string().into_bytes())
    }

    fn changed_since(&self, requested: &[(String, i64)]) -> Vec<Value> {
        let namespaces = self.namespaces.lock();
        requested
            .iter()
            .filter_map(|(namespace, id)| {
                let state = namespaces.get(namespace)?;
                (state.notification_id != *id).then(|| {
                    json!({
                        "namespaceName": namespace,
                        "notificationId": state.notification_id
                    })
                })
            })
            .collect()
    }

    async fn long_poll(&self, url: &str, notifications: &str) -> Result<Vec<u8>, TransportError> {
        let requested: Vec<(String, i64)> = serde_json::from_str::<Vec<Value>>(notifications)
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                reason: e.to_string()
            })?
            .iter()
            .filter_map(|n| {
                let namespace = n.get("namespaceName")?.as_str()?.to_string();
                let id = n.get("notificationId")?.as_i64()?;
                Some((namespace, id))
            })
            .collect();

        let deadline = Instant::now() + self.hold;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let changed = self.changed_since(&requested);
            if !changed.is_empty() {
                return Ok(Value::Array(changed).to_string().into_bytes());
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }
}

#[async_trait]
impl Transport for MockConfigServer {
    async fn request(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().push(url.to_string());
        debug!(url = %url, "Mock config server request");

        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Request {
                url: url.to_string(),
                reason: "connection refused".to_string()
            });
        }

        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string()
        })?;
        let segments: Vec<String> = parsed
            .path_segments()
            .map(|s| s.map(String::from).collect())
            .unwrap_or_default();
        let query: HashMap<String, String> = parsed.query_pairs().into_owned().collect();

        match segments.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
            ["configs", _app, _cluster, namespace] => {
                let namespace = percent_decode(namespace);
                let release_key = query.get("releaseKey").map(String::as_str).unwrap_or_default();
                self.fetch_config(url, &namespace, release_key)
            }
            ["notifications", "v2"] => {
                let notifications = query.get("notifications").map(String::as_str).unwrap_or("[]");
                self.long_poll(url, notifications).await
            }
            _ => Err(TransportError::Status {
                url: url.to_string(),
                status: 404
            })
        }
    }
}

fn percent_decode(segment: &str) -> String {
    Url::parse(&format!("http://decode/?v={segment}"))
        .ok()
        .and_then(|u| u.query_pairs().next().map(|(_, v)| v.into_owned()))
        .unwrap_or_else(|| segment.to_string())
}
