//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (requests, reconciles, lifecycle phases)
//! - Install the Prometheus recorder once per process
//! - Render the exposition text for the diagnostics endpoint
//!
//! # Metrics
//! - `harvester_http_requests_total` (counter): requests by method, status
//! - `harvester_http_request_duration_seconds` (histogram): latency distribution
//! - `harvester_reconcile_total` (counter): reconciles by controller, result
//! - `harvester_lifecycle_phase_total` (counter): orchestrator phase entries
//! - `harvester_diagnostics_bind_failures_total` (counter)
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Installation is idempotent; the first handle is kept

use std::sync::OnceLock;
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder, or return the one already installed.
///
/// Returns `None` when a different recorder owns the process.
pub fn install() -> Option<&'static PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Some(handle);
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(HANDLE.get_or_init(|| handle)),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install metrics recorder");
            HANDLE.get()
        }
    }
}

/// Render current metrics in Prometheus text format.
pub fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "harvester_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "harvester_http_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_reconcile(controller: &str, result: &'static str, start: Instant) {
    metrics::counter!(
        "harvester_reconcile_total",
        "controller" => controller.to_string(),
        "result" => result
    )
    .increment(1);
    metrics::histogram!(
        "harvester_reconcile_duration_seconds",
        "controller" => controller.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_phase(phase: &'static str) {
    metrics::counter!("harvester_lifecycle_phase_total", "phase" => phase).increment(1);
}

pub fn record_diagnostics_bind_failure() {
    metrics::counter!("harvester_diagnostics_bind_failures_total").increment(1);
}
