//! # Sync Engine
//!
//! The per-namespace fetch, diff, apply, persist and notify cycle, plus the
//! startup preload with its snapshot fallback.

use crate::decoder::DecoderRegistry;
use crate::diff::diff;
use crate::error::{ClientError, Result};
use crate::observers::DeliveryQueue;
use crate::poller::NamespaceRefresher;
use crate::protocol::{self, FetchResult};
use crate::telemetry::{RefreshTimer, Telemetry};
use async_trait::async_trait;
use config::ClientConfig;
use dashmap::DashMap;
use errors::{ConfigError, DecodeError, StorageError};
use rc_core::{Change, ChangeEvent, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use storage::Snapshot;
use tracing::{debug, info, warn};

pub struct SyncEngine {
    config: ClientConfig,
    store: Arc<storage::NamespaceStore>,
    decoders: DecoderRegistry,
    transport: Arc<dyn Transport>,
    queue: Arc<DeliveryQueue>,
    refresh_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>
}

impl SyncEngine {
    pub fn new(
        config: ClientConfig,
        store: Arc<storage::NamespaceStore>,
        decoders: DecoderRegistry,
        transport: Arc<dyn Transport>,
        queue: Arc<DeliveryQueue>
    ) -> Self {
        Self {
            config,
            store,
            decoders,
            transport,
            queue,
            refresh_locks: DashMap::new()
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<storage::NamespaceStore> {
        &self.store
    }

    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    pub fn dump_file_path(&self) -> PathBuf {
        self.config.dump_file_path()
    }

    /// Creates the cache directory if it is missing.
    pub fn ensure_cache_dir(&self) -> std::result::Result<(), ConfigError> {
        let dir = &self.config.cache_dir;
        match std::fs::metadata(dir) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(ConfigError::NotADirectory {
                path: dir.display().to_string()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::create_dir_all(dir).map_err(|e| ConfigError::CacheDirUnavailable {
                    path: dir.display().to_string(),
                    reason: e.to_string()
                })?;
                info!(path = %dir.display(), "Created cache directory");
                Ok(())
            }
            Err(e) => Err(ConfigError::CacheDirUnavailable {
                path: dir.display().to_string(),
                reason: e.to_string()
            })
        }
    }

    /// Loads every configured namespace, remote first.
    ///
    /// A namespace whose fetch fails is restored from the snapshot file as
    /// it was before preload began. Nothing is persisted until every
    /// namespace has loaded or fallen back, so a partial outage cannot
    /// overwrite the snapshot entries still needed. Only when no namespace
    /// could be loaded either way is the last failure returned.
    pub async fn preload(&self) -> Result<()> {
        let mut loaded = 0usize;
        let mut last_error = None;
        let mut snapshot: Option<Option<Snapshot>> = None;

        for namespace in &self.config.namespace_names {
            let remote_error = match self.sync_with(namespace, false).await {
                Ok(_) => {
                    loaded += 1;
                    continue;
                }
                Err(e) => e
            };

            warn!(
                namespace = %namespace,
                error = %remote_error,
                "Remote preload failed, falling back to snapshot"
            );

            if snapshot.is_none() {
                snapshot = Some(self.read_snapshot().await);
            }
            match snapshot.as_ref().and_then(Option::as_ref) {
                Some(snapshot) => {
                    let found = self.store.restore_namespace_from(snapshot, namespace);
                    info!(namespace = %namespace, found, "Namespace restored from snapshot");
                    Telemetry::record_preload_fallback(namespace);
                    loaded += 1;
                }
                None => {
                    warn!(namespace = %namespace, "Preload failed without local fallback");
                    last_error = Some(ClientError::preload_failed(namespace, remote_error));
                }
            }
        }

        if loaded > 0 {
            self.persist().await;
        }
        match last_error {
            Some(e) if loaded == 0 => Err(e),
            _ => Ok(())
        }
    }

    async fn read_snapshot(&self) -> Option<Snapshot> {
        let path = self.dump_file_path();
        let read = tokio::task::spawn_blocking(move || Snapshot::read_from(&path))
            .await
            .map_err(|e| StorageError::Serialization {
                reason: e.to_string()
            })
            .and_then(|result| result);

        match read {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!(error = %e, "Snapshot unavailable");
                None
            }
        }
    }

    /// Runs one sync cycle for `namespace` and hands a non-empty change
    /// event to the delivery queue.
    pub async fn refresh(&self, namespace: &str) -> Result<()> {
        let lock = self.refresh_lock(namespace);
        let _guard = lock.lock().await;

        if let Some(event) = self.sync_locked(namespace, true).await? {
            self.queue.deliver(event).await;
        }
        Ok(())
    }

    /// Runs one sync cycle for `namespace` and returns its change event
    /// without delivering it.
    pub async fn sync(&self, namespace: &str) -> Result<Option<ChangeEvent>> {
        self.sync_with(namespace, true).await
    }

    async fn sync_with(&self, namespace: &str, persist: bool) -> Result<Option<ChangeEvent>> {
        let lock = self.refresh_lock(namespace);
        let _guard = lock.lock().await;
        self.sync_locked(namespace, persist).await
    }

    fn refresh_lock(&self, namespace: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.refresh_locks
            .entry(namespace.to_string())
            .or_default()
            .clone()
    }

    async fn sync_locked(&self, namespace: &str, persist: bool) -> Result<Option<ChangeEvent>> {
        let timer = RefreshTimer::new(namespace);
        let outcome = self.fetch(namespace).await;
        timer.finish();

        let result = match outcome {
            Ok(Some(result)) => result,
            Ok(None) => {
                debug!(namespace = %namespace, "Namespace not modified");
                Telemetry::record_sync(namespace, "not_modified");
                return Ok(None);
            }
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Sync cycle failed");
                Telemetry::record_sync(namespace, "error");
                return Err(e);
            }
        };

        let event = match self.apply(namespace, result) {
            Ok(event) => event,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Discarding undecodable payload");
                Telemetry::record_sync(namespace, "error");
                return Err(e.into());
            }
        };
        if persist {
            self.persist().await;
        }

        match &event {
            Some(event) => {
                info!(namespace = %namespace, changes = event.len(), "Namespace changed");
                Telemetry::record_sync(namespace, "changed");
                Telemetry::record_change_event(namespace, event.len());
            }
            None => {
                debug!(namespace = %namespace, "Payload carried no changes");
                Telemetry::record_sync(namespace, "unchanged");
            }
        }
        Ok(event)
    }

    async fn fetch(&self, namespace: &str) -> Result<Option<FetchResult>> {
        let release_key = self.store.release_key(namespace).unwrap_or_default();
        let url = protocol::config_url(&self.config, namespace, &release_key)?;

        let body = self.transport.request(&url).await?;
        if body.is_empty() {
            return Ok(None);
        }

        let result = serde_json::from_slice::<FetchResult>(&body).map_err(|e| {
            DecodeError::InvalidPayload {
                namespace: namespace.to_string(),
                reason: e.to_string()
            }
        })?;
        Ok(Some(result))
    }

    /// Decodes `result`, applies the difference to the store and records
    /// the new release key. Nothing is touched when decoding fails.
    fn apply(
        &self,
        namespace: &str,
        result: FetchResult
    ) -> std::result::Result<Option<ChangeEvent>, DecodeError> {
        if !result.namespace_name.is_empty() && result.namespace_name != namespace {
            warn!(
                namespace = %namespace,
                returned = %result.namespace_name,
                "Server answered for a different namespace name"
            );
        }

        let configurations = result.configurations.unwrap_or_default();
        let entries = self
            .decoders
            .flatten_configurations(namespace, &configurations)?;

        let cache = self.store.must_get_cache(namespace);
        let changes = diff(&cache.dump(), &entries);
        for (key, change) in &changes {
            match change {
                Change::Add { new_value } | Change::Modify { new_value, .. } => {
                    cache.set(key.clone(), new_value.clone());
                }
                Change::Delete { .. } => {
                    cache.delete(key);
                }
            }
        }
        self.store
            .set_release_key(namespace, result.release_key);

        if changes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ChangeEvent::new(namespace, changes)))
        }
    }

    /// Writes the snapshot file; failures are logged and never abort a cycle.
    pub async fn persist(&self) {
        if let Err(e) = self.try_persist().await {
            warn!(error = %e, "Failed to persist namespace snapshot");
            Telemetry::record_persist_error();
        }
    }

    pub async fn try_persist(&self) -> std::result::Result<(), StorageError> {
        let store = self.store.clone();
        let path = self.dump_file_path();
        tokio::task::spawn_blocking(move || store.persist(&path))
            .await
            .map_err(|e| StorageError::Serialization {
                reason: e.to_string()
            })?
    }

    /// Replaces the whole store with the snapshot file.
    pub async fn restore(&self) -> std::result::Result<(), StorageError> {
        let store = self.store.clone();
        let path = self.dump_file_path();
        tokio::task::spawn_blocking(move || store.restore(&path))
            .await
            .map_err(|e| StorageError::Serialization {
                reason: e.to_string()
            })?
    }
}

#[async_trait]
impl NamespaceRefresher for SyncEngine {
    async fn refresh(&self, namespace: &str) -> Result<()> {
        SyncEngine::refresh(self, namespace).await
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("app_id", &self.config.app_id)
            .field("cluster", &self.config.cluster)
            .field("decoders", &self.decoders)
            .finish_non_exhaustive()
    }
}
