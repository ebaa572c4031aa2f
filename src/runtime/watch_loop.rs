//! # Watch Loop
//!
//! Runs the kube-runtime `Controller` over DataScienceCluster objects and
//! restarts it if the stream ends while the process is still healthy.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::DataScienceCluster;
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller watch loop until a shutdown signal arrives
///
/// # Errors
///
/// Currently never; the signature leaves room for fatal watch failures.
pub async fn run_watch_loop(
    clusters: Api<DataScienceCluster>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let concurrency = reconciler.config.max_concurrent_reconciliations;
    let restart_delay = reconciler.config.watch_restart_delay();

    // mark not ready on SIGINT/SIGTERM so probes fail while in-flight work drains
    let shutdown_state = server_state.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_state.set_ready(false);
    });

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        info!(
            "Starting controller watch loop (max concurrent reconciliations: {})",
            concurrency
        );
        Controller::new(clusters.clone(), watcher::Config::default().any_semantic())
            .with_config(controller::Config::default().concurrency(concurrency))
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, reconciler.clone())
            .for_each(|result| async move {
                match result {
                    Ok((obj, _action)) => debug!(resource.name = %obj.name, "watch.event.success"),
                    Err(controller::Error::ReconcilerFailed(_, obj)) => {
                        debug!(resource.name = %obj.name, "Reconcile failed, error policy requeued");
                    }
                    Err(e) => warn!("Controller stream error: {}", e),
                }
            })
            .instrument(watch_span)
            .await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller stream ended, restarting in {}s",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }

    Ok(())
}
