//! # Error Policy
//!
//! Requeue decision after a failed reconcile. Backoff is tracked per
//! DataScienceCluster so that one failing object does not slow the others.

use crate::controller::backoff::BackoffState;
use crate::controller::reconciler::Reconciler;
use crate::crd::DataScienceCluster;
use crate::error::Error;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
pub fn handle_reconciliation_error(
    obj: Arc<DataScienceCluster>,
    error: &Error,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %name,
        reason = error.reason(),
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", name, error);
    metrics::increment_reconciliation_errors_total(error.reason());

    let (delay, error_count) = next_error_backoff(&ctx, &name);
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {})",
        delay.as_secs(),
        error_count
    );
    info!(
        "📅 Next retry scheduled: {} (in {}s)",
        next_trigger_time.to_rfc3339(),
        delay.as_secs()
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}

/// Advance the backoff of `name` and return the delay with the running error count
pub fn next_error_backoff(ctx: &Reconciler, name: &str) -> (Duration, u32) {
    match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(name.to_string()).or_insert_with(|| {
                BackoffState::new(ctx.config.backoff_min_secs, ctx.config.backoff_max_secs)
            });
            let delay = state.record_error();
            (delay, state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using maximum backoff", e);
            (Duration::from_secs(ctx.config.backoff_max_secs.max(1)), 0)
        }
    }
}
