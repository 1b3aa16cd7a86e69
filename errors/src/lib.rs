//! # Remote Config Errors
//!
//! Error taxonomy shared by every crate of the remote configuration client.
//!
//! Each category maps to one recovery policy:
//! - `TransportError`: retried by the long-poll driver with backoff, never fatal
//! - `DecodeError`: the current refresh cycle is abandoned, cached state is kept
//! - `StorageError`: logged on persist; on restore it means "no local fallback"
//! - `ConfigError`: fatal, returned synchronously from startup

use thiserror::Error;

/// Failures talking to the configuration server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String }
}

impl TransportError {
    /// A timeout on a held request carries no information beyond "nothing
    /// changed yet"; everything else means the server is unhealthy.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Failures turning a server payload into a flat key/value mapping.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed payload for namespace {namespace}: {reason}")]
    InvalidPayload { namespace: String, reason: String },

    #[error("Malformed {format} content: {reason}")]
    InvalidContent { format: String, reason: String },

    #[error("Namespace {namespace} has no document content")]
    MissingContent { namespace: String }
}

/// Failures reading or writing the on-disk snapshot.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Snapshot file not found: {path}")]
    NotFound { path: String },

    #[error("Snapshot file {path} is corrupted: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("I/O on {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error
    },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String }
}

impl StorageError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source
        }
    }
}

/// Invalid client setup, detected before any background work starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cache path {path} exists and is not a directory")]
    NotADirectory { path: String },

    #[error("Cannot create cache directory {path}: {reason}")]
    CacheDirUnavailable { path: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String }
}
