//! # Namespace Store
//!
//! Thread-safe replica of every subscribed namespace.
//!
//! Locking is split in two levels: a directory lock guarding the
//! namespace-name to cache mapping, and one concurrent map per namespace.
//! Readers of one namespace never wait on writers of another, and the
//! directory lock is only held long enough to clone an `Arc`.

use crate::snapshot::Snapshot;
use dashmap::DashMap;
use errors::StorageError;
use parking_lot::{Mutex, RwLock};
use rc_core::{ConfigValue, NamespaceEntries};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Key/value contents of a single namespace.
#[derive(Debug, Default)]
pub struct NamespaceCache {
    entries: DashMap<String, ConfigValue>
}

impl NamespaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    pub fn set(&self, key: impl Into<String>, value: ConfigValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn delete(&self, key: &str) -> Option<ConfigValue> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the current contents.
    pub fn dump(&self) -> NamespaceEntries {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    fn replace_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, ConfigValue)>
    {
        self.entries.clear();
        for (key, value) in entries {
            self.entries.insert(key, value);
        }
    }
}

/// Namespace name to cache directory, plus the release key side-table.
#[derive(Debug, Default)]
pub struct NamespaceStore {
    caches: RwLock<HashMap<String, Arc<NamespaceCache>>>,
    release_keys: DashMap<String, String>,
    persist_lock: Mutex<()>
}

impl NamespaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self, namespace: &str) -> Option<Arc<NamespaceCache>> {
        self.caches.read().get(namespace).cloned()
    }

    /// Returns the cache for `namespace`, creating an empty one if needed.
    pub fn must_get_cache(&self, namespace: &str) -> Arc<NamespaceCache> {
        if let Some(cache) = self.cache(namespace) {
            return cache;
        }

        self.caches
            .write()
            .entry(namespace.to_string())
            .or_default()
            .clone()
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<ConfigValue> {
        self.cache(namespace)?.get(key)
    }

    pub fn set(&self, namespace: &str, key: impl Into<String>, value: ConfigValue) {
        self.must_get_cache(namespace).set(key, value);
    }

    pub fn delete(&self, namespace: &str, key: &str) -> Option<ConfigValue> {
        self.cache(namespace)?.delete(key)
    }

    /// Keys of `namespace`; empty when the namespace is unknown.
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        self.cache(namespace)
            .map(|cache| cache.keys())
            .unwrap_or_default()
    }

    /// Contents of `namespace`; empty when the namespace is unknown.
    pub fn entries(&self, namespace: &str) -> NamespaceEntries {
        self.cache(namespace)
            .map(|cache| cache.dump())
            .unwrap_or_default()
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    pub fn release_key(&self, namespace: &str) -> Option<String> {
        self.release_keys.get(namespace).map(|v| v.value().clone())
    }

    pub fn set_release_key(&self, namespace: &str, release_key: impl Into<String>) {
        self.release_keys
            .insert(namespace.to_string(), release_key.into());
    }

    /// Exports every namespace, locking one namespace at a time.
    pub fn snapshot_all(&self) -> Snapshot {
        let caches: Vec<(String, Arc<NamespaceCache>)> = self
            .caches
            .read()
            .iter()
            .map(|(name, cache)| (name.clone(), cache.clone()))
            .collect();

        let namespaces = caches
            .into_iter()
            .map(|(name, cache)| {
                let entries: BTreeMap<String, ConfigValue> = cache.dump().into_iter().collect();
                (name, entries)
            })
            .collect();

        Snapshot { namespaces }
    }

    /// Serializes the whole store to `path`. Concurrent calls are serialized.
    pub fn persist(&self, path: &Path) -> Result<(), StorageError> {
        let _guard = self.persist_lock.lock();
        let snapshot = self.snapshot_all();
        snapshot.write_to(path)?;
        debug!(
            path = %path.display(),
            namespaces = snapshot.namespaces.len(),
            "Persisted namespace snapshot"
        );
        Ok(())
    }

    /// Replaces the whole store with the snapshot at `path`.
    ///
    /// The file is read before anything is drained, so a missing or corrupt
    /// snapshot leaves the store untouched. All release keys are forgotten.
    pub fn restore(&self, path: &Path) -> Result<(), StorageError> {
        let snapshot = Snapshot::read_from(path)?;

        {
            let mut caches = self.caches.write();
            caches.retain(|name, cache| {
                let keep = snapshot.namespaces.contains_key(name);
                if !keep {
                    cache.replace_all(std::iter::empty());
                }
                keep
            });
            for (name, entries) in snapshot.namespaces {
                caches
                    .entry(name)
                    .or_default()
                    .replace_all(entries);
            }
        }
        self.release_keys.clear();

        info!(path = %path.display(), "Restored namespace store from snapshot");
        Ok(())
    }

    /// Replaces a single namespace with its contents in the snapshot at
    /// `path`, forgetting its release key.
    ///
    /// Returns whether the snapshot held the namespace; an absent namespace
    /// is restored as empty.
    pub fn restore_namespace(&self, path: &Path, namespace: &str) -> Result<bool, StorageError> {
        let snapshot = Snapshot::read_from(path)?;
        let found = self.restore_namespace_from(&snapshot, namespace);
        info!(
            path = %path.display(),
            namespace = %namespace,
            found,
            "Restored namespace from snapshot"
        );
        Ok(found)
    }

    /// Same as [`NamespaceStore::restore_namespace`] with a snapshot already
    /// read into memory.
    pub fn restore_namespace_from(&self, snapshot: &Snapshot, namespace: &str) -> bool {
        let entries = snapshot.namespace(namespace).cloned();
        let found = entries.is_some();

        self.must_get_cache(namespace)
            .replace_all(entries.unwrap_or_default());
        self.release_keys.remove(namespace);
        found
    }
}
