//! # Initialization
//!
//! Controller start-up: rustls setup, configuration, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::ControllerConfig;
use crate::constants::{DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS};
use crate::controller::apply::KubeResourceClient;
use crate::controller::reconciler::{KubeClusterStore, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::DataScienceCluster;
use crate::observability;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    /// API for the cluster-scoped DataScienceCluster CRD
    pub clusters: Api<DataScienceCluster>,
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Invalid configuration, a server that never binds, or no reachable cluster.
pub async fn initialize() -> Result<InitializationResult> {
    // Required for rustls 0.23+ when no default provider is set via features
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("Failed to install rustls crypto provider"));

    let config = ControllerConfig::from_env().context("Failed to load controller configuration")?;
    observability::init_logging(config.log_format)?;

    info!("Starting DataScienceCluster Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        applications_namespace = %config.applications_namespace,
        manifests_root = %config.manifests_root.display(),
        renderer = ?config.renderer,
        "Loaded controller configuration"
    );

    observability::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = server_state.clone();
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let clusters: Api<DataScienceCluster> = Api::all(client.clone());

    let store = Arc::new(KubeClusterStore::new(client.clone()));
    let resources = Arc::new(KubeResourceClient::new(client.clone()));
    let reconciler = Arc::new(
        Reconciler::new(store, resources, config).context("Failed to build reconciler")?,
    );

    log_existing_resources(&clusters).await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        clusters,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = Duration::from_millis(DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Startup summary of the DataScienceClusters the watch is about to pick up
async fn log_existing_resources(clusters: &Api<DataScienceCluster>) {
    match clusters.list(&ListParams::default()).await {
        Ok(list) => {
            let mut names: Vec<String> = list.items.iter().map(ResourceExt::name_any).collect();
            names.sort();
            info!(
                "CRD is queryable, found {} existing DataScienceCluster resources",
                names.len()
            );
            if !names.is_empty() {
                info!("  Resources: {}", names.join(", "));
            }
        }
        Err(e) => {
            warn!(
                "Failed to list DataScienceCluster resources (is the CRD installed?): {}",
                e
            );
        }
    }
}
