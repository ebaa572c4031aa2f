//! # Types
//!
//! Core types for the reconciler.

use super::store::ClusterStore;
use crate::config::ControllerConfig;
use crate::controller::apply::{ApplyEngine, ApplySummary, ResourceClient};
use crate::controller::backoff::BackoffState;
use crate::controller::components::ComponentRegistry;
use crate::controller::kustomize::ManifestRenderer;
use crate::controller::manifests::BundleProvider;
use crate::controller::profiles::ProfileTable;
use crate::constants::FINALIZER_ADDED_REQUEUE_SECS;
use crate::error::Result;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// What a single reconcile did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The DataScienceCluster no longer exists
    NotFound,
    /// Being deleted and cleanup already finished
    AlreadyFinalized,
    /// Components removed and finalizer released
    Finalized,
    /// Finalizer added; the real work happens on the next pass
    FinalizerAdded,
    /// Every component converged
    Ready(ApplySummary),
}

impl ReconcileOutcome {
    /// Requeue decision for the controller runtime
    #[must_use]
    pub fn action(&self, resync_interval: Duration) -> Action {
        match self {
            ReconcileOutcome::NotFound
            | ReconcileOutcome::AlreadyFinalized
            | ReconcileOutcome::Finalized => Action::await_change(),
            ReconcileOutcome::FinalizerAdded => {
                Action::requeue(Duration::from_secs(FINALIZER_ADDED_REQUEUE_SECS))
            }
            ReconcileOutcome::Ready(_) => Action::requeue(resync_interval),
        }
    }
}

/// Shared context handed to every reconcile
pub struct Reconciler {
    pub store: Arc<dyn ClusterStore>,
    pub engine: ApplyEngine,
    pub bundles: BundleProvider,
    pub renderer: ManifestRenderer,
    pub registry: ComponentRegistry,
    pub profiles: ProfileTable,
    pub config: ControllerConfig,
    /// Backoff state per DataScienceCluster name, driven by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("registry", &self.registry)
            .field("renderer", &self.renderer)
            .field("bundle_root", &self.bundles.root())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Wire the pipeline from configuration
    ///
    /// # Errors
    ///
    /// [`crate::error::Error::Configuration`] if the profile table file
    /// cannot be loaded or the download client cannot be built.
    pub fn new(
        store: Arc<dyn ClusterStore>,
        resources: Arc<dyn ResourceClient>,
        config: ControllerConfig,
    ) -> Result<Self> {
        let profiles = match &config.profiles_config_path {
            Some(path) => {
                let table = ProfileTable::from_file(path)?;
                info!(
                    "Loaded profile table from {} ({} profiles)",
                    path.display(),
                    table.profile_names().len()
                );
                table
            }
            None => ProfileTable::builtin(),
        };

        let bundles = BundleProvider::new(
            config.manifests_root.clone(),
            config.download_timeout(),
            config.manifests_sha256.clone(),
        )?;

        Ok(Self {
            store,
            engine: ApplyEngine::new(resources, &config.field_manager, config.conflict_retry()),
            bundles,
            renderer: ManifestRenderer::new(config.renderer),
            registry: ComponentRegistry::builtin()
                .with_default_overlay(config.manifests_overlay.as_deref()),
            profiles,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Forget the error history of `name` after a successful reconcile
    pub fn reset_backoff(&self, name: &str) -> bool {
        match self.backoff_states.lock() {
            Ok(mut states) => states
                .remove(name)
                .is_some_and(|state| state.error_count > 0),
            Err(_) => false,
        }
    }
}
