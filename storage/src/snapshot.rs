//! On-disk snapshot of the namespace store.
//!
//! The snapshot holds key/value contents only. Release keys are not part of
//! it, so a restored namespace always re-fetches unconditionally.

use errors::StorageError;
use rc_core::ConfigValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Point-in-time export of every namespace's contents.
///
/// Ordered maps keep the encoded file stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub namespaces: BTreeMap<String, BTreeMap<String, ConfigValue>>
}

impl Snapshot {
    pub fn namespace(&self, namespace: &str) -> Option<&BTreeMap<String, ConfigValue>> {
        self.namespaces.get(namespace)
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Writes the snapshot to `path` atomically: the content goes to a
    /// temporary file in the same directory which then replaces `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), StorageError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new(".")
        };

        let data = serde_json::to_vec(self).map_err(|e| StorageError::Serialization {
            reason: e.to_string()
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| StorageError::io(dir.display().to_string(), e))?;
        tmp.write_all(&data)
            .map_err(|e| StorageError::io(tmp.path().display().to_string(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StorageError::io(tmp.path().display().to_string(), e))?;
        tmp.persist(path)
            .map_err(|e| StorageError::io(path.display().to_string(), e.error))?;

        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, StorageError> {
        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound {
                path: path.display().to_string()
            },
            _ => StorageError::io(path.display().to_string(), e)
        })?;

        serde_json::from_slice(&data).map_err(|e| StorageError::Corrupted {
            path: path.display().to_string(),
            reason: e.to_string()
        })
    }
}
