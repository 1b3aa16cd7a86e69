//! # Client Configuration
//!
//! Bootstrap configuration for the remote configuration client.
//!
//! This crate provides:
//! - `ClientConfig`, the connection parameters of one client
//! - Configuration file loading (JSON `app.properties`, TOML, YAML)
//! - Environment variable overrides (12-factor app principles)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod validation;

pub use config::{ClientConfig, RetryConfig};
pub use file_loader::{ConfigFileError, load_from_file};
pub use loader::{apply_env_overrides, load_from_env};
pub use validation::validate;
