//! # Storage Layer
//!
//! In-memory replica of every subscribed namespace, plus the on-disk
//! snapshot used as an offline fallback.

pub mod namespace_store;
pub mod snapshot;

pub use namespace_store::{NamespaceCache, NamespaceStore};
pub use snapshot::Snapshot;
