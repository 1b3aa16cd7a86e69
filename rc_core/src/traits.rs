//! Capabilities the client consumes or exposes

use crate::types::{ChangeEvent, NamespaceEntries};
use async_trait::async_trait;
use errors::{DecodeError, TransportError};

/// Raw network access to the configuration server.
///
/// An empty payload with `Ok` means the server answered "not modified".
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

/// Format-specific flattening of one namespace's configuration values.
pub trait ContentDecoder: Send + Sync {
    /// Tag matching `NamespaceFormat::tag` for the namespaces this decoder serves.
    fn type_tag(&self) -> &str;

    /// Flattens one configuration value.
    ///
    /// `Ok(None)` means the value is not a document of this format and
    /// should be stored under its own key unchanged.
    fn parse(&self, raw: &serde_json::Value) -> Result<Option<NamespaceEntries>, DecodeError>;

    /// Decodes a whole document into a structured JSON tree, for callers
    /// that want to deserialize a namespace into their own types.
    fn decode_document(&self, content: &str) -> Result<serde_json::Value, DecodeError>;
}

/// Receives change events from the fan-out task.
///
/// Implementations should return quickly; every observer runs on the same
/// delivery task.
pub trait ChangeObserver: Send + Sync {
    fn handle_change_event(&self, event: &ChangeEvent);
}

impl<F> ChangeObserver for F
where
    F: Fn(&ChangeEvent) + Send + Sync
{
    fn handle_change_event(&self, event: &ChangeEvent) {
        self(event);
    }
}
