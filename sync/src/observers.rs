//! # Observer Registry & Fan-out
//!
//! Subscribers are kept in a copy-on-read list so a slow observer never
//! holds the registry lock. Change events travel through a bounded delivery
//! queue and are fanned out by a single task in FIFO order.

use crate::telemetry::Telemetry;
use parking_lot::{Mutex, RwLock};
use rc_core::{ChangeEvent, ChangeObserver};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

type Entry = (u64, Arc<dyn ChangeObserver>);

#[derive(Default)]
struct RegistryInner {
    observers: RwLock<Vec<Entry>>,
    next_id: AtomicU64
}

/// Thread-safe list of change observers.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    inner: Arc<RegistryInner>
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `observer` and returns a closure that removes this registration.
    ///
    /// Calling the closure more than once is a no-op. Registering the same
    /// observer twice yields two independent registrations.
    pub fn register(&self, observer: Arc<dyn ChangeObserver>) -> impl Fn() + Send + Sync + 'static {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut observers = self.inner.observers.write();
            observers.push((id, observer));
            observers.len()
        };
        Telemetry::set_observers(count);

        let registry = Arc::downgrade(&self.inner);
        move || {
            let Some(inner) = registry.upgrade() else {
                return;
            };
            let mut observers = inner.observers.write();
            let before = observers.len();
            observers.retain(|(entry_id, _)| *entry_id != id);
            if observers.len() != before {
                Telemetry::set_observers(observers.len());
            }
        }
    }

    /// Copy of the current observers in registration order.
    pub fn observers(&self) -> Vec<Arc<dyn ChangeObserver>> {
        self.inner
            .observers
            .read()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every current observer with `event`. A panicking observer is
    /// logged and skipped.
    pub fn notify(&self, event: &ChangeEvent) {
        for observer in self.observers() {
            let result = catch_unwind(AssertUnwindSafe(|| observer.handle_change_event(event)));
            if result.is_err() {
                error!(namespace = %event.namespace, "Change observer panicked");
                Telemetry::record_observer_panic();
            }
        }
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

/// Bounded queue between completed sync cycles and their consumer.
///
/// No channel exists until a consumer attaches; events produced before that,
/// or after `detach`, are dropped.
#[derive(Debug)]
pub struct DeliveryQueue {
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<ChangeEvent>>>,
    attached: Mutex<bool>,
    cancel: CancellationToken
}

impl DeliveryQueue {
    pub fn new(capacity: usize, cancel: CancellationToken) -> Self {
        Self {
            capacity: capacity.max(1),
            sender: Mutex::new(None),
            attached: Mutex::new(false),
            cancel
        }
    }

    /// Creates the channel and returns its receiving end. Only the first
    /// call gets a receiver.
    pub fn attach(&self) -> Option<mpsc::Receiver<ChangeEvent>> {
        let mut attached = self.attached.lock();
        if *attached || self.cancel.is_cancelled() {
            return None;
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        *self.sender.lock() = Some(tx);
        *attached = true;
        Some(rx)
    }

    /// Drops the sending end; the consumer sees the end of the stream once
    /// in-flight deliveries finish.
    pub fn detach(&self) {
        self.sender.lock().take();
    }

    pub fn is_attached(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Pushes `event` to the consumer.
    ///
    /// When the queue is full this waits for room, giving up if the client
    /// is cancelled.
    pub async fn deliver(&self, event: ChangeEvent) {
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            debug!(namespace = %event.namespace, "No change consumer attached, dropping event");
            Telemetry::record_dropped_delivery("detached");
            return;
        };

        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    namespace = %event.namespace,
                    capacity = self.capacity,
                    "Delivery queue is full, change consumer is falling behind"
                );
                Telemetry::record_queue_full();

                let namespace = event.namespace.clone();
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        debug!(namespace = %namespace, "Client stopped while waiting for queue space");
                        Telemetry::record_dropped_delivery("cancelled");
                    }
                    result = sender.send(event) => {
                        if result.is_err() {
                            Telemetry::record_dropped_delivery("closed");
                        }
                    }
                }
            }
            Err(TrySendError::Closed(event)) => {
                debug!(namespace = %event.namespace, "Change consumer went away, dropping event");
                Telemetry::record_dropped_delivery("closed");
            }
        }
    }
}

/// Spawns the task draining `receiver` into `registry` until the stream
/// ends or `cancel` fires.
pub fn spawn_fan_out(
    mut receiver: mpsc::Receiver<ChangeEvent>,
    registry: ObserverRegistry,
    cancel: CancellationToken
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = receiver.recv() => match event {
                    Some(event) => registry.notify(&event),
                    None => break
                }
            }
        }
        debug!("Change fan-out task exited");
    })
}
