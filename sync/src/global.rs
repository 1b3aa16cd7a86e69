//! Optional process-wide client for applications that want a single
//! shared instance. Everything here is a thin wrapper over [`Client`].

use crate::client::Client;
use crate::error::Result;
use config::ClientConfig;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

static DEFAULT_CLIENT: RwLock<Option<Arc<Client>>> = parking_lot::const_rwlock(None);

/// Installs `client` as the default instance, returning the previous one.
pub fn init(client: Client) -> Option<Arc<Client>> {
    DEFAULT_CLIENT.write().replace(Arc::new(client))
}

/// The default instance, if one was installed.
pub fn client() -> Option<Arc<Client>> {
    DEFAULT_CLIENT.read().clone()
}

/// Builds a client from `config`, installs it as the default instance and
/// starts it.
///
/// The client stays installed even when `start` reports an error, since it
/// keeps polling in the background.
pub async fn start_with_conf(config: ClientConfig) -> Result<Arc<Client>> {
    let client = Arc::new(Client::new(config)?);
    let previous = DEFAULT_CLIENT.write().replace(client.clone());
    if let Some(previous) = previous {
        previous.stop().await;
    }

    client.start().await?;
    Ok(client)
}

/// Same as [`start_with_conf`] with the configuration read from `path`.
pub async fn start_with_conf_file(path: impl AsRef<Path>) -> Result<Arc<Client>> {
    let config = config::load_from_file(path.as_ref())?;
    start_with_conf(config).await
}

/// Stops and removes the default instance.
pub async fn stop() {
    let client = DEFAULT_CLIENT.write().take();
    if let Some(client) = client {
        client.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[tokio::test]
    async fn test_default_instance_lifecycle() {
        stop().await;
        assert!(client().is_none());

        let err = start_with_conf_file("/definitely/missing/app.properties")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ConfigFile(_)));
        assert!(client().is_none());

        let installed = Client::new(ClientConfig::new("billing", "cfg.local:8080")).unwrap();
        assert!(init(installed).is_none());
        assert_eq!(client().unwrap().config().app_id, "billing");

        stop().await;
        assert!(client().is_none());
    }
}
