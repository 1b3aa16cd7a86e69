//! # Remote Config Core
//!
//! Shared types and capabilities for the remote configuration client.
//!
//! This crate provides:
//! - `ConfigValue`, the tagged leaf value stored per key
//! - `Change` / `ChangeEvent`, the unit of notification
//! - `NamespaceFormat`, suffix-based namespace classification
//! - The `Transport`, `ContentDecoder` and `ChangeObserver` capabilities

pub mod traits;
pub mod types;

pub use traits::{ChangeObserver, ContentDecoder, Transport};
pub use types::{
    Change, ChangeEvent, ChangeType, ConfigValue, DEFAULT_NAMESPACE, NamespaceEntries,
    NamespaceFormat
};
