//! # Sync Engine
//!
//! Client-side replica of remotely managed configuration.
//!
//! A long-poll driver watches the subscribed namespaces; each notification
//! triggers a fetch that is decoded, diffed against the local store, applied,
//! persisted to the snapshot file and reported to observers as a
//! `ChangeEvent`.

pub mod accessors;
pub mod client;
pub mod decoder;
pub mod diff;
pub mod engine;
pub mod error;
pub mod global;
pub mod observers;
pub mod poller;
pub mod protocol;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod proptests;

pub use accessors::NamespaceView;
pub use client::{Client, ClientBuilder};
pub use decoder::DecoderRegistry;
pub use diff::diff;
pub use engine::SyncEngine;
pub use error::{ClientError, Result};
pub use observers::{DeliveryQueue, ObserverRegistry};
pub use poller::{LongPoller, NamespaceRefresher};
pub use transport::HttpTransport;
