use metrics::{counter, gauge, histogram};
use std::time::Instant;

pub struct Telemetry;

impl Telemetry {
    /// `outcome` is one of `changed`, `unchanged`, `not_modified`, `error`.
    pub fn record_sync(namespace: &str, outcome: &'static str) {
        counter!(
            "rc_sync_cycles_total",
            "namespace" => namespace.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }

    pub fn record_change_event(namespace: &str, changes: usize) {
        counter!("rc_change_events_total", "namespace" => namespace.to_string()).increment(1);
        histogram!("rc_change_event_size", "namespace" => namespace.to_string()).record(changes as f64);
    }

    pub fn record_preload_fallback(namespace: &str) {
        counter!("rc_preload_fallbacks_total", "namespace" => namespace.to_string()).increment(1);
    }

    pub fn record_persist_error() {
        counter!("rc_persist_errors_total").increment(1);
    }

    pub fn record_long_poll_error(kind: &'static str) {
        counter!("rc_long_poll_errors_total", "kind" => kind).increment(1);
    }

    pub fn record_queue_full() {
        counter!("rc_delivery_queue_full_total").increment(1);
    }

    pub fn record_dropped_delivery(reason: &'static str) {
        counter!("rc_delivery_dropped_total", "reason" => reason).increment(1);
    }

    pub fn record_observer_panic() {
        counter!("rc_observer_panics_total").increment(1);
    }

    pub fn set_observers(count: usize) {
        gauge!("rc_observers").set(count as f64);
    }

    pub fn set_watched_namespaces(count: usize) {
        gauge!("rc_watched_namespaces").set(count as f64);
    }

    pub fn record_refresh_latency(namespace: &str, duration_ms: f64) {
        histogram!("rc_refresh_duration_ms", "namespace" => namespace.to_string()).record(duration_ms);
    }
}

pub struct RefreshTimer {
    start: Instant,
    namespace: String
}

impl RefreshTimer {
    pub fn new(namespace: &str) -> Self {
        Self {
            start: Instant::now(),
            namespace: namespace.to_string()
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed().as_millis() as f64;
        Telemetry::record_refresh_latency(&self.namespace, duration);
    }
}
