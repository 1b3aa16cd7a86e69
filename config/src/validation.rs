//! # Configuration Validation
//!
//! Validates `ClientConfig` with the `validator` crate and converts failures
//! into the shared `ConfigError`.

use crate::config::ClientConfig;
use errors::ConfigError;
use validator::Validate;

/// Validate configuration structure.
///
/// # M-CANONICAL-DOCS
///
/// ## Validation Rules
/// - `app_id`, `cluster`: 1-255 characters
/// - `ip`: 1-2048 characters
/// - `namespace_names`: no blank entries
/// - `long_poll_timeout_seconds`: 61-600 (must outlast the server's 60s hold)
/// - `query_timeout_seconds`: 1-60
/// - `delivery_queue_capacity`: 1-4096
/// - `retry.initial_backoff_ms`: 1-60000, `retry.max_backoff_ms`: 1-600000
pub fn validate(config: &ClientConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|e| ConfigError::Invalid {
        reason: e.to_string()
    })
}
