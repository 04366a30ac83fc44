//! Prometheus metrics for the gateway.
//!
//! Installs a global Prometheus recorder using
//! `metrics-exporter-prometheus` and defines metric name constants.
//! Hosts render the exposition text from the returned handle.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

// -- Metric name constants ----------------------------------------------------

/// Total gateway operations (counter). Labels: operation, bucket, status.
pub const OPERATIONS_TOTAL: &str = "storegate_operations_total";

/// Total operation errors (counter). Labels: bucket, error.
pub const ERRORS_TOTAL: &str = "storegate_errors_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent -- safe to call
/// multiple times (e.g. in tests). Returns a reference to the global handle.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(OPERATIONS_TOTAL, "Total gateway operations by outcome");
    describe_counter!(ERRORS_TOTAL, "Total operation errors by error code");
}

// -- Recording helpers --------------------------------------------------------

/// Record one operation outcome.
pub fn record_operation(operation: &str, bucket: &str, status: &str) {
    counter!(
        OPERATIONS_TOTAL,
        "operation" => operation.to_string(),
        "bucket" => bucket.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record one operation error by stable error code.
pub fn record_error(bucket: &str, error: &str) {
    counter!(
        ERRORS_TOTAL,
        "bucket" => bucket.to_string(),
        "error" => error.to_string()
    )
    .increment(1);
}

// -- Tests --------------------------------------------------------------------
