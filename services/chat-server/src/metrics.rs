//! Prometheus metrics exposition
//!
//! Service-level series recorded here:
//!
//! - `chat_requests_total` (counter): label `status`
//! - `chat_request_duration_seconds` (histogram): label `status`
//!
//! The failover crate adds `failover_attempts_total{classification}` and
//! `failover_dispatch_total{result}` through the same global recorder.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

/// Histogram buckets from 5ms to 60s. A chat request can walk the whole
/// credential pool, so the top bucket matches the backend timeout default.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Counters backing the /health endpoint.
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("chat_request_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Handle backed by a recorder that is not installed globally.
///
/// Used when the service runs without exporting (and by tests, since only
/// one global recorder may exist per process).
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Record a finished chat request.
pub fn record_chat_request(status: u16, duration_secs: f64) {
    let status = status.to_string();
    metrics::counter!("chat_requests_total", "status" => status.clone()).increment(1);
    metrics::histogram!("chat_request_duration_seconds", "status" => status).record(duration_secs);
}
