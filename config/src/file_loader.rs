//! # Bootstrap File Loading
//!
//! Loads `ClientConfig` from JSON (`app.properties`), TOML or YAML files.
//!
//! Supports automatic format detection based on file extension.

use crate::config::ClientConfig;
use std::path::Path;
use validator::Validate;

/// Bootstrap file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors)
}

/// Load configuration from a JSON file.
///
/// `app.properties` bootstrap files are JSON documents despite their
/// extension, so both `.properties` and `.json` land here.
pub fn load_from_json(path: &Path) -> Result<ClientConfig, ConfigFileError> {
    let contents = read(path)?;
    serde_json::from_str(&contents).map_err(|e| ConfigFileError::JsonParse(e.to_string()))
}

pub fn load_from_toml(path: &Path) -> Result<ClientConfig, ConfigFileError> {
    let contents = read(path)?;
    toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))
}

pub fn load_from_yaml(path: &Path) -> Result<ClientConfig, ConfigFileError> {
    let contents = read(path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))
}

/// Load and validate configuration from file with auto-detection.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Loads the client bootstrap file, detecting the format from its extension,
/// then runs field validation so a bad file fails before any network or
/// filesystem work.
///
/// ## Supported Formats
/// - `.properties`, `.json`: JSON
/// - `.toml`: TOML
/// - `.yaml`, `.yml`: YAML
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_file;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_file(Path::new("app.properties"))?;
///     println!("app: {}", config.app_id);
///     Ok(())
/// }
/// ```
pub fn load_from_file(path: &Path) -> Result<ClientConfig, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    let config = match extension.to_lowercase().as_str() {
        "properties" | "json" => load_from_json(path)?,
        "toml" => load_from_toml(path)?,
        "yaml" | "yml" => load_from_yaml(path)?,
        other => return Err(ConfigFileError::UnsupportedFormat(other.to_string()))
    };

    config.validate()?;
    Ok(config)
}

fn read(path: &Path) -> Result<String, ConfigFileError> {
    std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))
}
