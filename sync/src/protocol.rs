//! Wire shapes and URLs of the configuration server API.

use config::ClientConfig;
use errors::TransportError;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Notification id of a namespace the client has never been notified about.
pub const DEFAULT_NOTIFICATION_ID: i64 = -1;

/// Body of a successful config fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    #[serde(default)]
    pub namespace_name: String,
    #[serde(default)]
    pub configurations: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub release_key: String
}

/// One entry of the long-poll request and response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub namespace_name: String,
    pub notification_id: i64
}

impl Notification {
    pub fn new(namespace_name: impl Into<String>, notification_id: i64) -> Self {
        Self {
            namespace_name: namespace_name.into(),
            notification_id
        }
    }
}

/// `<server>/configs/<app_id>/<cluster>/<namespace>?releaseKey=..[&ip=..]`
pub fn config_url(
    config: &ClientConfig,
    namespace: &str,
    release_key: &str
) -> Result<String, TransportError> {
    let mut url = server_url(config, &["configs", &config.app_id, &config.cluster, namespace])?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("releaseKey", release_key);
        if let Some(ip) = config.client_ip.as_deref() {
            query.append_pair("ip", ip);
        }
    }
    Ok(url.into())
}

/// `<server>/notifications/v2?appId=..&cluster=..&notifications=[..]`
pub fn notifications_url(
    config: &ClientConfig,
    notifications: &[Notification]
) -> Result<String, TransportError> {
    let mut url = server_url(config, &["notifications", "v2"])?;
    let encoded = serde_json::to_string(notifications).map_err(|e| TransportError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string()
    })?;

    url.query_pairs_mut()
        .append_pair("appId", &config.app_id)
        .append_pair("cluster", &config.cluster)
        .append_pair("notifications", &encoded);
    Ok(url.into())
}

fn server_url(config: &ClientConfig, segments: &[&str]) -> Result<Url, TransportError> {
    let base = config.server_url();
    let invalid = |reason: String| TransportError::InvalidUrl {
        url: base.clone(),
        reason
    };

    let mut url = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("server address cannot carry a path".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
