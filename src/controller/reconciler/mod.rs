//! # Reconciler
//!
//! Drives DataScienceCluster objects towards their declared component set.
//!
//! - `types`: shared context and outcome types
//! - `store`: access to the DataScienceCluster object and its events
//! - `status`: phase and condition transitions
//! - `finalizer`: finalizer add/remove
//! - `reconcile`: the per-event state machine

pub mod finalizer;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod types;

pub use store::{ClusterStore, EventSeverity, KubeClusterStore};
pub use types::{ReconcileOutcome, Reconciler};

use crate::crd::DataScienceCluster;
use crate::error::Error;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Controller entry point
///
/// # Errors
///
/// Whatever the pass failed with; the error policy decides the requeue.
pub async fn reconcile(
    cluster: Arc<DataScienceCluster>,
    ctx: Arc<Reconciler>,
) -> Result<Action, Error> {
    let name = cluster.name_any();
    let span = info_span!("reconcile", resource.name = %name);
    let start = Instant::now();
    metrics::increment_reconciliations_total();

    let outcome = ctx.reconcile_cluster(&name).instrument(span).await?;
    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    if ctx.reset_backoff(&name) {
        info!("🔄 Backoff reset for {} after successful reconciliation", name);
    }
    if let ReconcileOutcome::Ready(summary) = &outcome {
        info!(
            "✅ Reconciliation complete for {} (created {}, updated {}, unchanged {}, deleted {}, duration: {:.2}s)",
            name,
            summary.created,
            summary.updated,
            summary.unchanged,
            summary.deleted,
            start.elapsed().as_secs_f64()
        );
    }

    Ok(outcome.action(ctx.config.resync_interval()))
}
