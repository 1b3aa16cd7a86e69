//! # Client
//!
//! Entry point tying the store, the sync engine, the long-poll driver and
//! the observer fan-out together.

use crate::accessors::NamespaceView;
use crate::decoder::DecoderRegistry;
use crate::engine::SyncEngine;
use crate::error::{ClientError, Result};
use crate::observers::{DeliveryQueue, ObserverRegistry, spawn_fan_out};
use crate::poller::LongPoller;
use crate::transport::HttpTransport;
use config::ClientConfig;
use errors::ConfigError;
use parking_lot::Mutex;
use rc_core::{ChangeEvent, ChangeObserver, ConfigValue, ContentDecoder, DEFAULT_NAMESPACE, Transport};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use storage::NamespaceStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Default)]
struct Tasks {
    started: bool,
    poller: Option<JoinHandle<()>>,
    fan_out: Option<JoinHandle<()>>
}

/// Builder for [`Client`] allowing custom transports and decoders.
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    long_poll_transport: Option<Arc<dyn Transport>>,
    decoders: DecoderRegistry
}

impl ClientBuilder {
    /// Uses `transport` for both config fetches and long polls.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport.clone());
        self.long_poll_transport = Some(transport);
        self
    }

    pub fn with_long_poll_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.long_poll_transport = Some(transport);
        self
    }

    /// Registers `decoder` for its type tag, replacing the built-in one.
    pub fn with_decoder(mut self, decoder: Arc<dyn ContentDecoder>) -> Self {
        self.decoders.register(decoder);
        self
    }

    pub fn build(self) -> Result<Client> {
        config::validate(&self.config)?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.config.query_timeout())?)
        };
        let long_poll_transport: Arc<dyn Transport> = match self.long_poll_transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.config.long_poll_timeout())?)
        };

        let cancel = CancellationToken::new();
        let store = Arc::new(NamespaceStore::new());
        let queue = Arc::new(DeliveryQueue::new(
            self.config.delivery_queue_capacity,
            cancel.clone()
        ));
        let engine = Arc::new(SyncEngine::new(
            self.config.clone(),
            store,
            self.decoders,
            transport,
            queue.clone()
        ));
        let poller = Arc::new(LongPoller::new(
            self.config.clone(),
            long_poll_transport,
            engine.clone(),
            cancel.clone()
        ));

        Ok(Client {
            config: self.config,
            engine,
            poller,
            observers: ObserverRegistry::new(),
            queue,
            cancel,
            tasks: Mutex::new(Tasks::default())
        })
    }
}

/// Client-side replica of the configuration held by the server.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Keeps every subscribed namespace in memory, follows server changes through
/// long polling, persists a snapshot used when the server is unreachable, and
/// reports key-level changes to registered observers.
///
/// ## Usage
/// ```rust,no_run
/// use config::ClientConfig;
/// use std::sync::Arc;
/// use sync::Client;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::new(ClientConfig::new("billing", "config.internal:8080"))?;
///     client.start().await?;
///
///     let _recall = client.register_observer(Arc::new(|event: &rc_core::ChangeEvent| {
///         println!("{} changed {} keys", event.namespace, event.len());
///     }));
///     client.start_watch_update();
///
///     let timeout = client.get_int_or("http.timeout", 30);
///     println!("timeout: {timeout}");
///
///     client.stop().await;
///     Ok(())
/// }
/// ```
///
/// ## Lifecycle
/// `start` may be called once. After `stop` the store stays readable but no
/// background refresh happens and the client cannot be restarted.
pub struct Client {
    config: ClientConfig,
    engine: Arc<SyncEngine>,
    poller: Arc<LongPoller>,
    observers: ObserverRegistry,
    queue: Arc<DeliveryQueue>,
    cancel: CancellationToken,
    tasks: Mutex<Tasks>
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            transport: None,
            long_poll_transport: None,
            decoders: DecoderRegistry::default()
        }
    }

    /// Builds a client from a bootstrap file such as `app.properties`.
    pub fn from_conf_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = config::load_from_file(path.as_ref())?;
        Self::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Prepares the cache directory, preloads every configured namespace and
    /// launches the long-poll driver.
    ///
    /// Fails on an unusable cache directory, or when no namespace could be
    /// loaded remotely or from the snapshot. The driver is started in the
    /// latter case too.
    pub async fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Stopped);
        }
        {
            let mut tasks = self.tasks.lock();
            if tasks.started {
                return Err(ClientError::AlreadyStarted);
            }
            tasks.started = true;
        }

        if let Err(e) = self.engine.ensure_cache_dir() {
            self.tasks.lock().started = false;
            return Err(e.into());
        }

        let preload = self.engine.preload().await;

        let handle = self.poller.clone().start();
        self.tasks.lock().poller = Some(handle);
        info!(
            app_id = %self.config.app_id,
            cluster = %self.config.cluster,
            namespaces = self.config.namespace_names.len(),
            "Client started"
        );

        preload
    }

    /// Cancels background work and detaches the delivery queue, then waits
    /// for the background tasks to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.queue.detach();

        let (poller, fan_out) = {
            let mut tasks = self.tasks.lock();
            (tasks.poller.take(), tasks.fan_out.take())
        };
        for handle in [poller, fan_out].into_iter().flatten() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!(app_id = %self.config.app_id, "Client stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fetches each namespace not yet watched and adds it to the watch set.
    ///
    /// Every namespace is watched afterwards, even when its first fetch
    /// fails; the long-poll driver keeps retrying it. The last fetch failure
    /// is returned.
    pub async fn subscribe_to_namespaces<I, S>(&self, namespaces: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Stopped);
        }

        let namespaces: Vec<String> = namespaces.into_iter().map(Into::into).collect();
        if let Some(blank) = namespaces.iter().find(|ns| ns.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                reason: format!("namespace name {blank:?} is blank")
            }
            .into());
        }

        let mut last_error = None;
        for namespace in self.poller.add_namespaces(namespaces) {
            if let Err(e) = self.engine.refresh(&namespace).await {
                warn!(namespace = %namespace, error = %e, "Initial fetch of subscribed namespace failed");
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(())
        }
    }

    pub fn watched_namespaces(&self) -> Vec<String> {
        self.poller.namespaces()
    }

    /// Registers `observer` for events delivered by the built-in fan-out.
    /// The returned closure removes it again.
    pub fn register_observer(&self, observer: Arc<dyn ChangeObserver>) -> impl Fn() + Send + Sync + 'static {
        self.observers.register(observer)
    }

    pub fn observers(&self) -> Vec<Arc<dyn ChangeObserver>> {
        self.observers.observers()
    }

    /// Hands the raw change stream to the caller.
    ///
    /// Returns `None` if the stream was already taken, by this method or by
    /// [`Client::start_watch_update`], or if the client is stopped.
    pub fn watch_update(&self) -> Option<mpsc::Receiver<ChangeEvent>> {
        self.queue.attach()
    }

    /// Spawns the fan-out task delivering change events to registered
    /// observers. Must be called within a tokio runtime.
    ///
    /// Returns `false` if the change stream is already taken.
    pub fn start_watch_update(&self) -> bool {
        let Some(receiver) = self.queue.attach() else {
            return false;
        };

        let handle = spawn_fan_out(receiver, self.observers.clone(), self.cancel.clone());
        self.tasks.lock().fan_out = Some(handle);
        true
    }

    /// Typed access to `namespace`.
    pub fn namespace<'a>(&'a self, namespace: &'a str) -> NamespaceView<'a> {
        NamespaceView::new(self.engine.store(), self.engine.decoders(), namespace)
    }

    fn default_namespace(&self) -> NamespaceView<'_> {
        self.namespace(DEFAULT_NAMESPACE)
    }

    pub fn get_all_keys(&self, namespace: &str) -> Vec<String> {
        self.namespace(namespace).keys()
    }

    pub fn get_release_key(&self, namespace: &str) -> Option<String> {
        self.namespace(namespace).release_key()
    }

    pub fn get_value(&self, key: &str) -> Option<ConfigValue> {
        self.default_namespace().get_value(key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.default_namespace().get_string(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.default_namespace().get_int(key)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.default_namespace().get_float(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.default_namespace().get_bool(key)
    }

    pub fn get_string_slice(&self, key: &str) -> Option<Vec<String>> {
        self.default_namespace().get_string_slice(key)
    }

    pub fn get_int_slice(&self, key: &str) -> Option<Vec<i64>> {
        self.default_namespace().get_int_slice(key)
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.default_namespace().get_string_or(key, default)
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.default_namespace().get_int_or(key, default)
    }

    pub fn get_float_or(&self, key: &str, default: f64) -> f64 {
        self.default_namespace().get_float_or(key, default)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.default_namespace().get_bool_or(key, default)
    }

    /// Unparsed document of a yml, yaml or json namespace.
    pub fn get_namespace_content(&self, namespace: &str) -> Option<String> {
        self.namespace(namespace).content()
    }

    /// Deserializes a document namespace into `T`.
    pub fn get_namespace_value<T: DeserializeOwned>(&self, namespace: &str) -> Result<T> {
        self.namespace(namespace).value()
    }

    /// Replaces the whole store with the snapshot file.
    pub async fn load_local(&self) -> Result<()> {
        Ok(self.engine.restore().await?)
    }

    /// Writes the snapshot file now.
    pub async fn dump_local(&self) -> Result<()> {
        Ok(self.engine.try_persist().await?)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("app_id", &self.config.app_id)
            .field("cluster", &self.config.cluster)
            .field("stopped", &self.is_stopped())
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}
