use errors::{ConfigError, DecodeError, StorageError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigFileError),
    #[error("Preload of namespace {namespace} failed: {source}")]
    PreloadFailed {
        namespace: String,
        #[source]
        source: Box<ClientError>
    },
    #[error("Client is already started")]
    AlreadyStarted,
    #[error("Client is stopped")]
    Stopped,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error)
}

impl ClientError {
    pub fn preload_failed(namespace: impl Into<String>, source: ClientError) -> Self {
        ClientError::PreloadFailed {
            namespace: namespace.into(),
            source: Box::new(source)
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
