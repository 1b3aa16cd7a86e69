//! HTTP implementation of the `Transport` capability.

use async_trait::async_trait;
use errors::TransportError;
use rc_core::Transport;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// `reqwest` backed transport with a fixed per-request timeout.
///
/// `200` yields the body, `304` yields an empty payload, every other status
/// is a `TransportError::Status`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request {
                url: String::new(),
                reason: e.to_string()
            })?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(&self, url: &str, error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                reason: error.to_string()
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        debug!(url = %url, "Requesting configuration server");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_error(url, &e))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| self.map_error(url, &e))?;
                Ok(body.to_vec())
            }
            StatusCode::NOT_MODIFIED => Ok(Vec::new()),
            status => Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16()
            })
        }
    }
}
