// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Lightspeed operator.
//!
//! All metrics carry the `ols_openshift_io_` prefix (prometheus-safe version
//! of "ols.openshift.io") and are served on `/metrics` by [`crate::server`].
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - passes by outcome and their duration
//! - **Resource Metrics** - per-kind create/update/skip/delete decisions
//! - **Error Metrics** - failed pipeline steps by task and error kind
//!
//! # Example
//!
//! ```rust,no_run
//! use lightspeed_operator::metrics::record_resource_action;
//!
//! record_resource_action("ConfigMap", "skipped");
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all operator metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "ols_openshift_io";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliation passes by outcome
///
/// Labels:
/// - `status`: `success`, `in_progress`, `removed`, `ignored` or `error`
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliation passes by outcome",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliation passes in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliation passes in seconds by outcome",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = HistogramVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Resource Metrics
// ============================================================================

/// Managed resource decisions
///
/// Labels:
/// - `resource_type`: Kind of the managed resource (e.g., `Deployment`)
/// - `action`: `created`, `updated`, `skipped` or `deleted`
pub static RESOURCE_ACTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resource_actions_total"),
        "Managed resource decisions by kind and action",
    );
    let counter = CounterVec::new(opts, &["resource_type", "action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Failed pipeline steps
///
/// Labels:
/// - `task`: Name of the failing step, `none` outside a pipeline
/// - `error_kind`: Stable error kind (e.g., `MissingDependency`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Failed pipeline steps by task and error kind",
    );
    let counter = CounterVec::new(opts, &["task", "error_kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record the outcome and duration of one reconciliation pass
///
/// # Arguments
/// * `status` - Outcome label, see [`RECONCILIATION_TOTAL`]
/// * `duration` - Wall time of the pass
pub fn record_reconciliation(status: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&[status]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration.as_secs_f64());
}

/// Record one create/update/skip/delete decision
pub fn record_resource_action(resource_type: &str, action: &str) {
    RESOURCE_ACTIONS_TOTAL
        .with_label_values(&[resource_type, action])
        .inc();
}

/// Record a failed pass
///
/// # Arguments
/// * `task` - Failing pipeline step, if any
/// * `error_kind` - Debug name of the root error kind
pub fn record_error(task: Option<&str>, error_kind: &str) {
    ERRORS_TOTAL
        .with_label_values(&[task.unwrap_or("none"), error_kind])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
