//! # DataScienceCluster Controller
//!
//! Reconciles cluster-scoped `DataScienceCluster` objects: resolves the
//! requested profile into a per-component plan, renders each component's
//! kustomize manifests and converges the cluster towards them.
//!
//! See the [README.md](../README.md) for configuration and usage.

use anyhow::Result;
use datasciencecluster_controller::runtime::{initialize, run_watch_loop};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(init.clusters, init.reconciler, init.server_state).await?;

    info!("Controller stopped");
    Ok(())
}
