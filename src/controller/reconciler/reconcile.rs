//! # Reconcile
//!
//! One pass of the DataScienceCluster state machine:
//!
//! 1. fetch the object (gone → nothing to do)
//! 2. being deleted → remove component resources, then release the finalizer
//! 3. no finalizer yet → add it and come back
//! 4. otherwise resolve the plan and push every component through
//!    obtain → render → rewrite namespace → apply/remove
//!
//! The first failing component aborts the pass, moves the phase to Error
//! and records a Warning event.

use super::finalizer::has_finalizer;
use super::status::{mark_error, mark_progressing, mark_ready, needs_progressing, status_changed};
use super::store::EventSeverity;
use super::types::{ReconcileOutcome, Reconciler};
use crate::constants::{
    MANAGED_SERVICE_ADDON, MANAGED_SERVICE_ADDON_API_VERSION, MANAGED_SERVICE_ADDON_KIND,
    RECONCILE_COMPLETED_EVENT_REASON, RECONCILE_ERROR_EVENT_REASON,
};
use crate::controller::apply::{ApplySummary, ManagedScope};
use crate::controller::components::{managed_service_extras, ComponentDescriptor};
use crate::controller::manifests::{rewrite_namespace, ResourceKey};
use crate::controller::profiles::{resolve, ReconciliationPlan};
use crate::crd::{ClusterPhase, DataScienceCluster, DataScienceClusterStatus};
use crate::error::{ClientError, Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use std::path::Path;
use tracing::{debug, info, info_span, warn, Instrument};

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Reconciler {
    /// Run the state machine for the DataScienceCluster called `name`
    ///
    /// # Errors
    ///
    /// The first failure of the pass; status and events have already been
    /// updated when this returns.
    pub async fn reconcile_cluster(&self, name: &str) -> Result<ReconcileOutcome> {
        let Some(cluster) = self
            .store
            .get(name)
            .await
            .map_err(|source| Error::Apply {
                resource: format!("DataScienceCluster/{name}"),
                source,
            })?
        else {
            debug!("DataScienceCluster {} not found, nothing to do", name);
            return Ok(ReconcileOutcome::NotFound);
        };

        if cluster.meta().deletion_timestamp.is_some() {
            if !has_finalizer(&cluster) {
                return Ok(ReconcileOutcome::AlreadyFinalized);
            }
            info!("🗑️  Deleting DataScienceCluster {}", name);
            if let Err(e) = self.finalize(&cluster).await {
                self.store
                    .record_event(
                        &cluster,
                        EventSeverity::Warning,
                        RECONCILE_ERROR_EVENT_REASON,
                        format!("Failed to finalize DataScienceCluster {name}: {e}"),
                    )
                    .await;
                return Err(e);
            }
            return Ok(ReconcileOutcome::Finalized);
        }

        if !has_finalizer(&cluster) {
            self.add_finalizer(&cluster).await?;
            return Ok(ReconcileOutcome::FinalizerAdded);
        }

        let generation = cluster.meta().generation;
        let mut persisted = cluster.status.clone().unwrap_or_default();
        if needs_progressing(&persisted, generation) {
            let mut progressing = persisted.clone();
            mark_progressing(&mut progressing, &now());
            self.persist_status(name, &persisted, &mut progressing).await?;
            persisted = progressing;
        }
        let mut status = persisted.clone();

        match self.apply_components(&cluster).await {
            Ok((plan, summary)) => {
                mark_ready(&mut status, &plan, generation, &now());
                if self.persist_status(name, &persisted, &mut status).await? {
                    self.store
                        .record_event(
                            &cluster,
                            EventSeverity::Normal,
                            RECONCILE_COMPLETED_EVENT_REASON,
                            format!("DataScienceCluster {name} reconciled successfully"),
                        )
                        .await;
                }
                Ok(ReconcileOutcome::Ready(summary))
            }
            Err(e) => {
                mark_error(&mut status, &e, generation, &now());
                if let Err(status_error) = self.persist_status(name, &persisted, &mut status).await
                {
                    warn!(error = %status_error, "Failed to record error status");
                }
                self.store
                    .record_event(
                        &cluster,
                        EventSeverity::Warning,
                        RECONCILE_ERROR_EVENT_REASON,
                        format!("Failed to reconcile DataScienceCluster {name}: {e}"),
                    )
                    .await;
                Err(e)
            }
        }
    }

    /// Write `status` if it differs from `persisted`; returns whether it wrote
    async fn persist_status(
        &self,
        name: &str,
        persisted: &DataScienceClusterStatus,
        status: &mut DataScienceClusterStatus,
    ) -> Result<bool> {
        if !status_changed(persisted, status) {
            return Ok(false);
        }
        status.last_reconcile_time = Some(now());
        self.store
            .patch_status(name, status)
            .await
            .map_err(|source| Error::StatusUpdate {
                name: name.to_string(),
                source,
            })?;
        debug!(
            phase = %status.phase.unwrap_or(ClusterPhase::Uninitialized),
            "Status updated"
        );
        Ok(true)
    }

    async fn apply_components(
        &self,
        cluster: &DataScienceCluster,
    ) -> Result<(ReconciliationPlan, ApplySummary)> {
        let plan = resolve(
            &cluster.spec.profile,
            &cluster.spec.components.overrides(),
            &self.registry.names(),
            &self.profiles,
        )?;
        info!(
            profile = %cluster.spec.profile,
            plan = ?plan.as_map(),
            "Resolved reconciliation plan"
        );

        let owner = owner_reference(cluster)?;
        let root = self.bundles.obtain(&self.config.manifests_uri).await?;
        let mut total = ApplySummary::default();

        if self.is_managed_service().await {
            let extras = managed_service_extras();
            if root.join(&extras.manifest_dir).is_dir() {
                let summary = self.reconcile_component(&root, &extras, &owner, true).await?;
                accumulate(&mut total, summary);
            } else {
                warn!(
                    "Managed service detected but {} has no {} directory",
                    root.display(),
                    extras.manifest_dir
                );
            }
        }

        for component in self.registry.iter() {
            let enabled = plan.is_enabled(&component.name);
            let summary = self
                .reconcile_component(&root, component, &owner, enabled)
                .await?;
            accumulate(&mut total, summary);
        }

        Ok((plan, total))
    }

    /// Render, rewrite and apply (or sweep) one component
    async fn reconcile_component(
        &self,
        root: &Path,
        component: &ComponentDescriptor,
        owner: &OwnerReference,
        enabled: bool,
    ) -> Result<ApplySummary> {
        let base = root.join(&component.manifest_dir);
        if !enabled && !base.exists() {
            debug!(component = %component.name, "Disabled component has no manifests, skipping");
            return Ok(ApplySummary::default());
        }

        let span = info_span!(
            "reconcile.component",
            component = %component.name,
            enabled = enabled,
        );
        async {
            let rendered = self
                .renderer
                .render(&base, component.overlay.as_deref())
                .await?;
            let resources = rewrite_namespace(rendered, &self.config.applications_namespace);
            debug!(resources = resources.len(), "Rendered component manifests");
            let scope = ManagedScope::new(owner.clone(), &component.name);
            self.engine.apply(&scope, resources, enabled).await
        }
        .instrument(span)
        .await
    }

    async fn finalize(&self, cluster: &DataScienceCluster) -> Result<()> {
        self.cleanup(cluster).await?;
        self.remove_finalizer(&cluster.name_any()).await
    }

    /// Sweep every registered component whose manifests are available,
    /// plus the managed-service extras when the addon is present
    async fn cleanup(&self, cluster: &DataScienceCluster) -> Result<()> {
        let owner = owner_reference(cluster)?;
        let root = self.bundles.obtain(&self.config.manifests_uri).await?;

        if self.is_managed_service().await {
            let extras = managed_service_extras();
            if root.join(&extras.manifest_dir).is_dir() {
                self.reconcile_component(&root, &extras, &owner, false)
                    .await?;
            }
        }

        for component in self.registry.iter() {
            if !root.join(&component.manifest_dir).exists() {
                continue;
            }
            self.reconcile_component(&root, component, &owner, false)
                .await?;
        }
        Ok(())
    }

    /// Whether the managed-service addon exists; lookup failures count as no
    async fn is_managed_service(&self) -> bool {
        let addon = ResourceKey::new(
            MANAGED_SERVICE_ADDON_API_VERSION,
            MANAGED_SERVICE_ADDON_KIND,
            None,
            MANAGED_SERVICE_ADDON,
        );
        match self.engine.client().get(&addon).await {
            Ok(found) => found.is_some(),
            Err(ClientError::UnknownKind { .. }) => false,
            Err(e) => {
                warn!(error = %e, "Failed to look up managed-service addon, assuming self-managed");
                false
            }
        }
    }
}

fn owner_reference(cluster: &DataScienceCluster) -> Result<OwnerReference> {
    cluster.controller_owner_ref(&()).ok_or_else(|| {
        Error::Configuration(format!(
            "DataScienceCluster {} has no uid",
            cluster.name_any()
        ))
    })
}

fn accumulate(total: &mut ApplySummary, summary: ApplySummary) {
    total.created += summary.created;
    total.updated += summary.updated;
    total.unchanged += summary.unchanged;
    total.deleted += summary.deleted;
}
