//! # Long-Poll Driver
//!
//! A single background task holding one notification request open for the
//! whole watch set. The server answers early when any namespace moved past
//! the notification id we sent; each such namespace is then refreshed.

use crate::error::Result;
use crate::protocol::{self, DEFAULT_NOTIFICATION_ID, Notification};
use crate::telemetry::Telemetry;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use config::ClientConfig;
use errors::{DecodeError, TransportError};
use futures_util::future::join_all;
use parking_lot::Mutex;
use rc_core::Transport;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback run for every namespace the server reports as changed.
#[async_trait]
pub trait NamespaceRefresher: Send + Sync {
    async fn refresh(&self, namespace: &str) -> Result<()>;
}

/// Why a single poll produced no notifications.
#[derive(Debug, Error)]
enum PollError {
    #[error(transparent)]
    Transport(TransportError),
    #[error(transparent)]
    Decode(DecodeError),
    #[error("{failed} of {total} namespace refreshes failed")]
    Refresh { failed: usize, total: usize }
}

pub struct LongPoller {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    refresher: Arc<dyn NamespaceRefresher>,
    notifications: Mutex<BTreeMap<String, i64>>,
    watch_changed: Notify,
    cancel: CancellationToken
}

impl LongPoller {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        refresher: Arc<dyn NamespaceRefresher>,
        cancel: CancellationToken
    ) -> Self {
        let notifications = config
            .namespace_names
            .iter()
            .map(|ns| (ns.clone(), DEFAULT_NOTIFICATION_ID))
            .collect();

        Self {
            config,
            transport,
            refresher,
            notifications: Mutex::new(notifications),
            watch_changed: Notify::new(),
            cancel
        }
    }

    /// Adds namespaces to the watch set and restarts the in-flight poll so
    /// they are covered immediately. Returns the namespaces that were new.
    pub fn add_namespaces<I, S>(&self, namespaces: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        let (added, total) = {
            let mut notifications = self.notifications.lock();
            let mut added = Vec::new();
            for namespace in namespaces {
                let namespace = namespace.into();
                if !notifications.contains_key(&namespace) {
                    notifications.insert(namespace.clone(), DEFAULT_NOTIFICATION_ID);
                    added.push(namespace);
                }
            }
            (added, notifications.len())
        };

        if !added.is_empty() {
            info!(added = added.len(), watched = total, "Watch set extended");
            Telemetry::set_watched_namespaces(total);
            self.watch_changed.notify_one();
        }
        added
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.notifications.lock().keys().cloned().collect()
    }

    pub fn notification_id(&self, namespace: &str) -> Option<i64> {
        self.notifications.lock().get(namespace).copied()
    }

    /// Spawns the polling loop.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        Telemetry::set_watched_namespaces(self.notifications.lock().len());
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        let retry = &self.config.retry;
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(retry.initial_backoff())
            .with_max_interval(retry.max_backoff())
            .with_max_elapsed_time(None)
            .build();

        info!(app_id = %self.config.app_id, cluster = %self.config.cluster, "Long-poll driver started");

        loop {
            let outcome = tokio::select! {
                () = self.cancel.cancelled() => break,
                () = self.watch_changed.notified() => {
                    debug!("Watch set changed, restarting long poll");
                    continue;
                }
                outcome = self.poll_once() => outcome
            };

            let outcome = match outcome {
                Ok(changed) if changed.is_empty() => Ok(()),
                Ok(changed) => self.refresh_all(changed).await,
                Err(e) => Err(e)
            };

            match outcome {
                Ok(()) => backoff.reset(),
                Err(PollError::Transport(e)) if e.is_timeout() => {
                    debug!(error = %e, "Long poll timed out without notification");
                    backoff.reset();
                }
                Err(e) => {
                    let kind = match &e {
                        PollError::Transport(_) => "transport",
                        PollError::Decode(_) => "decode",
                        PollError::Refresh { .. } => "refresh"
                    };
                    Telemetry::record_long_poll_error(kind);

                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| retry.max_backoff());
                    warn!(error = %e, delay_ms = delay.as_millis() as u64, "Long poll failed, backing off");

                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = self.watch_changed.notified() => {}
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("Long-poll driver stopped");
    }

    /// Issues one notification request.
    ///
    /// Returns the notifications for watched namespaces; empty means nothing
    /// changed within the server's hold window. Ids are not recorded here.
    async fn poll_once(&self) -> std::result::Result<Vec<Notification>, PollError> {
        let request: Vec<Notification> = self
            .notifications
            .lock()
            .iter()
            .map(|(ns, id)| Notification::new(ns.clone(), *id))
            .collect();

        let url = protocol::notifications_url(&self.config, &request).map_err(PollError::Transport)?;
        let body = self
            .transport
            .request(&url)
            .await
            .map_err(PollError::Transport)?;
        if body.is_empty() {
            return Ok(Vec::new());
        }

        let response: Vec<Notification> = serde_json::from_slice(&body).map_err(|e| {
            PollError::Decode(DecodeError::InvalidPayload {
                namespace: "notifications".to_string(),
                reason: e.to_string()
            })
        })?;

        let notifications = self.notifications.lock();
        Ok(response
            .into_iter()
            .filter(|notification| {
                let watched = notifications.contains_key(&notification.namespace_name);
                if !watched {
                    debug!(
                        namespace = %notification.namespace_name,
                        "Ignoring notification for unwatched namespace"
                    );
                }
                watched
            })
            .collect())
    }

    /// Refreshes the notified namespaces concurrently and records the new
    /// id of each one that refreshed.
    ///
    /// A failed namespace keeps its previous id, so the next poll reports it
    /// again and the refresh is retried.
    async fn refresh_all(&self, changed: Vec<Notification>) -> std::result::Result<(), PollError> {
        let refreshes = changed.into_iter().map(|notification| async move {
            match self.refresher.refresh(&notification.namespace_name).await {
                Ok(()) => Some(notification),
                Err(e) => {
                    warn!(
                        namespace = %notification.namespace_name,
                        error = %e,
                        "Refresh after notification failed"
                    );
                    None
                }
            }
        });

        let results = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            results = join_all(refreshes) => results
        };

        let total = results.len();
        let mut failed = 0;
        let mut notifications = self.notifications.lock();
        for result in results {
            match result {
                Some(notification) => {
                    if let Some(id) = notifications.get_mut(&notification.namespace_name) {
                        *id = notification.notification_id;
                    }
                }
                None => failed += 1
            }
        }

        if failed == 0 {
            Ok(())
        } else {
            Err(PollError::Refresh { failed, total })
        }
    }
}

impl std::fmt::Debug for LongPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongPoller")
            .field("notifications", &*self.notifications.lock())
            .finish_non_exhaustive()
    }
}
