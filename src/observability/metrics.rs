//! Request metrics collection and exposition.
//!
//! # Responsibilities
//! - Count requests and accumulate latency per operation (HTTP method)
//! - Track in-flight requests
//! - Expose a JSON snapshot and, optionally, a Prometheus endpoint
//!
//! # Metrics
//! - `http_requests_total` (counter): total requests by method
//! - `http_requests_in_flight` (gauge): requests currently being served
//! - `http_request_duration_ms` (snapshot only): accumulated latency by method
//! - `http_request_duration_seconds` (histogram, facade only): latency distribution
//!
//! # Design Decisions
//! - The sink is constructed explicitly and shared through `Arc`, never global
//! - Every update is mirrored to the `metrics` facade; a no-op without a recorder
//! - Low-overhead metric updates (atomic operations)

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";
pub const REQUEST_DURATION_MS: &str = "http_request_duration_ms";
pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Per-operation request counters.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    totals: DashMap<String, AtomicU64>,
    latency_ms: DashMap<String, AtomicU64>,
    in_flight: AtomicI64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a request as started. The gauge drops again when the guard does.
    pub fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        metrics::gauge!(REQUESTS_IN_FLIGHT).increment(1.0);
        InFlight {
            metrics: Arc::clone(self),
        }
    }

    /// Record a finished request for `operation`.
    pub fn record(&self, operation: &str, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        add(&self.totals, operation, 1);
        add(&self.latency_ms, operation, millis);

        metrics::counter!(REQUESTS_TOTAL, "method" => operation.to_string()).increment(1);
        metrics::histogram!(REQUEST_DURATION_SECONDS, "method" => operation.to_string())
            .record(elapsed.as_secs_f64());
    }

    pub fn total(&self, operation: &str) -> u64 {
        read(&self.totals, operation)
    }

    /// Accumulated latency for `operation`, in milliseconds.
    pub fn latency_ms(&self, operation: &str) -> u64 {
        read(&self.latency_ms, operation)
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            http_requests_total: collect(&self.totals),
            http_requests_in_flight: self.in_flight(),
            http_request_duration_ms: collect(&self.latency_ms),
        }
    }
}

fn add(map: &DashMap<String, AtomicU64>, key: &str, delta: u64) {
    if let Some(counter) = map.get(key) {
        counter.fetch_add(delta, Ordering::Relaxed);
        return;
    }
    map.entry(key.to_string())
        .or_default()
        .fetch_add(delta, Ordering::Relaxed);
}

fn read(map: &DashMap<String, AtomicU64>, key: &str) -> u64 {
    map.get(key)
        .map(|counter| counter.load(Ordering::Relaxed))
        .unwrap_or(0)
}

fn collect(map: &DashMap<String, AtomicU64>) -> BTreeMap<String, u64> {
    map.iter()
        .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
        .collect()
}

/// Guard for one in-flight request.
#[derive(Debug)]
pub struct InFlight {
    metrics: Arc<RequestMetrics>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.metrics.in_flight.fetch_sub(1, Ordering::Relaxed);
        metrics::gauge!(REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

/// Serializable view of [`RequestMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub http_requests_total: BTreeMap<String, u64>,
    pub http_requests_in_flight: i64,
    pub http_request_duration_ms: BTreeMap<String, u64>,
}

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_prometheus(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_operation() {
        let metrics = RequestMetrics::new();
        metrics.record("GET", Duration::from_millis(5));
        metrics.record("GET", Duration::from_millis(7));
        metrics.record("POST", Duration::from_millis(1));

        assert_eq!(metrics.total("GET"), 2);
        assert_eq!(metrics.latency_ms("GET"), 12);
        assert_eq!(metrics.total("POST"), 1);
        assert_eq!(metrics.total("DELETE"), 0);
    }

    #[test]
    fn in_flight_guard() {
        let metrics = Arc::new(RequestMetrics::new());
        let first = metrics.begin();
        let second = metrics.begin();
        assert_eq!(metrics.in_flight(), 2);

        drop(first);
        assert_eq!(metrics.in_flight(), 1);
        drop(second);
        assert_eq!(metrics.in_flight(), 0);
    }

    #[test]
    fn snapshot_serializes_with_expvar_keys() {
        let metrics = RequestMetrics::new();
        metrics.record("GET", Duration::from_millis(3));

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["http_requests_total"]["GET"], 1);
        assert_eq!(json["http_requests_in_flight"], 0);
        assert_eq!(json["http_request_duration_ms"]["GET"], 3);
    }
}
