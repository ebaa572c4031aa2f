//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `datasciencecluster_reconciliations_total` - Total number of reconciliations
//! - `datasciencecluster_reconciliation_errors_total` - Reconciliation errors by reason
//! - `datasciencecluster_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `datasciencecluster_requeues_total` - Requeues by trigger source
//! - `datasciencecluster_resources_applied_total` - Resource operations by action
//! - `datasciencecluster_conflict_retries_total` - Retries caused by version conflicts
//! - `datasciencecluster_bundle_downloads_total` - Manifest bundle downloads started
//! - `datasciencecluster_bundle_download_errors_total` - Failed bundle installs by reason
//! - `datasciencecluster_bundle_download_duration_seconds` - Duration of bundle installs
//! - `datasciencecluster_render_duration_seconds` - Duration of manifest rendering
//! - `datasciencecluster_render_errors_total` - Failed manifest renders

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "datasciencecluster_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "datasciencecluster_reconciliation_errors_total",
            "Total number of reconciliation errors by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "datasciencecluster_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "datasciencecluster_requeues_total",
            "Total number of requeues by trigger source",
        ),
        &["trigger"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static RESOURCES_APPLIED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "datasciencecluster_resources_applied_total",
            "Total number of managed resource operations by action",
        ),
        &["action"],
    )
    .expect("Failed to create RESOURCES_APPLIED_TOTAL metric - this should never happen")
});

static CONFLICT_RETRIES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "datasciencecluster_conflict_retries_total",
        "Total number of retries caused by resourceVersion conflicts",
    )
    .expect("Failed to create CONFLICT_RETRIES_TOTAL metric - this should never happen")
});

static BUNDLE_DOWNLOADS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "datasciencecluster_bundle_downloads_total",
        "Total number of manifest bundle downloads",
    )
    .expect("Failed to create BUNDLE_DOWNLOADS_TOTAL metric - this should never happen")
});

static BUNDLE_DOWNLOAD_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "datasciencecluster_bundle_download_errors_total",
            "Total number of failed manifest bundle installs by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create BUNDLE_DOWNLOAD_ERRORS_TOTAL metric - this should never happen")
});

static BUNDLE_DOWNLOAD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "datasciencecluster_bundle_download_duration_seconds",
            "Duration of manifest bundle download and extraction in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
    )
    .expect("Failed to create BUNDLE_DOWNLOAD_DURATION metric - this should never happen")
});

static RENDER_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "datasciencecluster_render_duration_seconds",
            "Duration of component manifest rendering in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create RENDER_DURATION metric - this should never happen")
});

static RENDER_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "datasciencecluster_render_errors_total",
        "Total number of failed component manifest renders",
    )
    .expect("Failed to create RENDER_ERRORS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESOURCES_APPLIED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONFLICT_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BUNDLE_DOWNLOADS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BUNDLE_DOWNLOAD_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BUNDLE_DOWNLOAD_DURATION.clone()))?;
    REGISTRY.register(Box::new(RENDER_DURATION.clone()))?;
    REGISTRY.register(Box::new(RENDER_ERRORS_TOTAL.clone()))?;

    Ok(())
}

/// Encode every registered metric in the Prometheus text format
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn gather_text() -> Result<String> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_reconciliations_total() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors_total(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(trigger: &str) {
    REQUEUES_TOTAL.with_label_values(&[trigger]).inc();
}

pub fn increment_resources_applied_total(action: &str) {
    RESOURCES_APPLIED_TOTAL.with_label_values(&[action]).inc();
}

pub fn increment_conflict_retries_total() {
    CONFLICT_RETRIES_TOTAL.inc();
}

pub fn increment_bundle_downloads_total() {
    BUNDLE_DOWNLOADS_TOTAL.inc();
}

pub fn increment_bundle_download_errors_total(reason: &str) {
    BUNDLE_DOWNLOAD_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn observe_bundle_download_duration(duration: f64) {
    BUNDLE_DOWNLOAD_DURATION.observe(duration);
}

pub fn observe_render_duration(duration: f64) {
    RENDER_DURATION.observe(duration);
}

pub fn increment_render_errors_total() {
    RENDER_ERRORS_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelled_counters_accumulate() {
        let before = RESOURCES_APPLIED_TOTAL.with_label_values(&["created"]).get();
        increment_resources_applied_total("created");
        increment_resources_applied_total("created");
        assert_eq!(
            RESOURCES_APPLIED_TOTAL.with_label_values(&["created"]).get(),
            before + 2
        );
    }

    #[test]
    fn test_registered_metrics_are_encoded() {
        // registration is process-wide; another test may have done it already
        let _ = register_metrics();
        increment_reconciliations_total();
        let text = gather_text().expect("encodes");
        assert!(text.contains("datasciencecluster_reconciliations_total"));
    }
}
