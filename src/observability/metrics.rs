//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `ups_binding_events_total` - Watch events received, by event type
//! - `ups_binding_outcomes_total` - Processing outcomes, by outcome
//! - `ups_binding_registry_operations_total` - UnifiedPush calls, by operation and result
//! - `ups_binding_registry_operation_duration_seconds` - UnifiedPush call latency
//! - `ups_binding_mirror_operations_total` - Mirror ConfigMap calls, by operation and result
//! - `ups_binding_request_cleanup_errors_total` - Binding secrets that could not be removed
//! - `ups_binding_retries_total` - Retries of transient failures, by operation
//! - `ups_binding_watch_restarts_total` - Watch reconnects, by reason

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static EVENTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ups_binding_events_total",
            "Total number of secret watch events received",
        ),
        &["event"],
    )
    .expect("Failed to create EVENTS_TOTAL metric - this should never happen")
});

static OUTCOMES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ups_binding_outcomes_total",
            "Total number of processed events by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create OUTCOMES_TOTAL metric - this should never happen")
});

static REGISTRY_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ups_binding_registry_operations_total",
            "Total number of UnifiedPush operations",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create REGISTRY_OPERATIONS_TOTAL metric - this should never happen")
});

static REGISTRY_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "ups_binding_registry_operation_duration_seconds",
            "Duration of UnifiedPush operations in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 30.0]),
        &["operation"],
    )
    .expect("Failed to create REGISTRY_OPERATION_DURATION metric - this should never happen")
});

static MIRROR_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ups_binding_mirror_operations_total",
            "Total number of mirror ConfigMap operations",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create MIRROR_OPERATIONS_TOTAL metric - this should never happen")
});

static REQUEST_CLEANUP_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ups_binding_request_cleanup_errors_total",
        "Total number of binding secrets that could not be removed after processing",
    )
    .expect("Failed to create REQUEST_CLEANUP_ERRORS_TOTAL metric - this should never happen")
});

static RETRIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ups_binding_retries_total",
            "Total number of retries after transient failures",
        ),
        &["operation"],
    )
    .expect("Failed to create RETRIES_TOTAL metric - this should never happen")
});

static WATCH_RESTARTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "ups_binding_watch_restarts_total",
            "Total number of secret watch reconnects",
        ),
        &["reason"],
    )
    .expect("Failed to create WATCH_RESTARTS_TOTAL metric - this should never happen")
});

/// Register all metrics with the process registry. Call once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(EVENTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OUTCOMES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REGISTRY_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REGISTRY_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(MIRROR_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEST_CLEANUP_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_RESTARTS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_events(event: &str) {
    EVENTS_TOTAL.with_label_values(&[event]).inc();
}

pub fn increment_outcome(outcome: &str) {
    OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}

#[cfg(test)]
pub(crate) fn outcome_count(outcome: &str) -> u64 {
    OUTCOMES_TOTAL.with_label_values(&[outcome]).get()
}

pub fn record_registry_operation(operation: &str, result: &str, duration_secs: f64) {
    REGISTRY_OPERATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
    REGISTRY_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

pub fn record_mirror_operation(operation: &str, result: &str) {
    MIRROR_OPERATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}

pub fn increment_request_cleanup_errors() {
    REQUEST_CLEANUP_ERRORS_TOTAL.inc();
}

pub fn increment_retries(operation: &str) {
    RETRIES_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_watch_restarts(reason: &str) {
    WATCH_RESTARTS_TOTAL.with_label_values(&[reason]).inc();
}
