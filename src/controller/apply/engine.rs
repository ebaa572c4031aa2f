//! # Apply Engine
//!
//! Converges the cluster towards a rendered resource set for one component.
//!
//! Enabled components are created or patched one resource at a time in kind
//! priority order. An object that already contains every desired field is
//! left alone, so re-applying an unchanged set issues no writes. Disabled
//! components are swept: rendered identities and labelled leftovers owned by
//! the same DataScienceCluster are deleted in reverse priority order.

use super::client::ResourceClient;
use super::retry::{retry_on_conflict, ConflictRetry, RetryError};
use super::{sort_for_apply, sort_for_delete};
use crate::constants::{COMPONENT_LABEL, GENERATED_RESOURCE_LABEL, OWNER_LABEL};
use crate::controller::manifests::{is_subset, ResourceDocument, ResourceKey};
use crate::error::{ClientError, Error, Result};
use crate::observability::metrics;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Who owns the resources being applied and which component they belong to
#[derive(Debug, Clone)]
pub struct ManagedScope {
    pub owner: OwnerReference,
    pub component: String,
}

impl ManagedScope {
    #[must_use]
    pub fn new(owner: OwnerReference, component: &str) -> Self {
        Self {
            owner,
            component: component.to_string(),
        }
    }

    #[must_use]
    pub fn owner_uid(&self) -> &str {
        &self.owner.uid
    }

    /// The component/owner label pair stamped on every created resource
    #[must_use]
    pub fn selector(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (COMPONENT_LABEL.to_string(), self.component.clone()),
            (OWNER_LABEL.to_string(), self.owner.name.clone()),
        ])
    }

    fn stamp(&self, resource: &mut ResourceDocument) {
        resource.set_owner_reference(&self.owner);
        resource.set_label(GENERATED_RESOURCE_LABEL, "true");
        for (key, value) in self.selector() {
            resource.set_label(&key, &value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Created,
    Updated,
    Unchanged,
    Deleted,
}

impl ApplyAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ApplyAction::Created => "created",
            ApplyAction::Updated => "updated",
            ApplyAction::Unchanged => "unchanged",
            ApplyAction::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

impl ApplySummary {
    fn record(&mut self, action: ApplyAction) {
        match action {
            ApplyAction::Created => self.created += 1,
            ApplyAction::Updated => self.updated += 1,
            ApplyAction::Unchanged => self.unchanged += 1,
            ApplyAction::Deleted => self.deleted += 1,
        }
        metrics::increment_resources_applied_total(action.as_str());
    }

    /// Number of write requests that changed the cluster
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

pub struct ApplyEngine {
    client: Arc<dyn ResourceClient>,
    field_manager: String,
    retry: ConflictRetry,
}

impl ApplyEngine {
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>, field_manager: &str, retry: ConflictRetry) -> Self {
        Self {
            client,
            field_manager: field_manager.to_string(),
            retry,
        }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn ResourceClient> {
        &self.client
    }

    /// Apply `resources` when `enabled`, otherwise sweep them
    ///
    /// # Errors
    ///
    /// The first [`Error::Apply`] or [`Error::ConflictRetryExhausted`]; the
    /// remaining resources are not processed.
    pub async fn apply(
        &self,
        scope: &ManagedScope,
        resources: Vec<ResourceDocument>,
        enabled: bool,
    ) -> Result<ApplySummary> {
        if !enabled {
            return self.remove(scope, resources).await;
        }

        let mut summary = ApplySummary::default();
        for mut resource in sort_for_apply(resources) {
            scope.stamp(&mut resource);
            let action = self.converge(&resource).await?;
            debug!(resource = %resource.key(), action = action.as_str(), "Resource converged");
            summary.record(action);
        }

        info!(
            component = %scope.component,
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            "Component applied"
        );
        Ok(summary)
    }

    /// Delete everything of `resources` that this owner created
    ///
    /// Objects owned by someone else are never touched. Kinds the API server
    /// does not serve are treated as having no instances.
    ///
    /// # Errors
    ///
    /// The first [`Error::Apply`]; NotFound on delete is not an error.
    pub async fn remove(
        &self,
        scope: &ManagedScope,
        resources: Vec<ResourceDocument>,
    ) -> Result<ApplySummary> {
        let mut summary = ApplySummary::default();
        let mut handled = BTreeSet::new();
        let resources = sort_for_delete(resources);

        for resource in &resources {
            let key = resource.key();
            let live = match self.client.get(&key).await {
                Ok(live) => live,
                Err(ClientError::UnknownKind { .. }) => None,
                Err(source) => return Err(apply_error(&key, source)),
            };
            handled.insert(key.clone());
            match live {
                Some(live) if live.is_owned_by(scope.owner_uid()) => {
                    if self.delete(&key).await? {
                        summary.record(ApplyAction::Deleted);
                    }
                }
                Some(_) => warn!(resource = %key, "Skipping resource not owned by this DataScienceCluster"),
                None => {}
            }
        }

        // leftovers from earlier renders that are no longer in the bundle
        let selector = scope.selector();
        let mut swept_kinds = BTreeSet::new();
        for resource in &resources {
            let kind_scope = (
                resource.api_version().to_string(),
                resource.kind().to_string(),
                resource.namespace().map(str::to_string),
            );
            if !swept_kinds.insert(kind_scope.clone()) {
                continue;
            }
            let (api_version, kind, namespace) = kind_scope;
            let labeled = match self
                .client
                .list_labeled(&api_version, &kind, namespace.as_deref(), &selector)
                .await
            {
                Ok(items) => items,
                Err(ClientError::UnknownKind { .. }) => Vec::new(),
                Err(source) => {
                    let key = ResourceKey::new(&api_version, &kind, namespace.as_deref(), "*");
                    return Err(apply_error(&key, source));
                }
            };
            for leftover in labeled {
                let key = leftover.key();
                if handled.contains(&key) || !leftover.is_owned_by(scope.owner_uid()) {
                    continue;
                }
                handled.insert(key.clone());
                if self.delete(&key).await? {
                    summary.record(ApplyAction::Deleted);
                }
            }
        }

        if summary.deleted > 0 {
            info!(
                component = %scope.component,
                deleted = summary.deleted,
                "🧹 Removed resources of disabled component"
            );
        }
        Ok(summary)
    }

    /// Bring one live object in line with `desired`
    async fn converge(&self, desired: &ResourceDocument) -> Result<ApplyAction> {
        let key = desired.key();
        let client = &*self.client;
        let field_manager = self.field_manager.as_str();
        let key_ref = &key;

        let outcome = retry_on_conflict(&self.retry, &key.to_string(), |attempt| async move {
            let action = match client.get(key_ref).await? {
                None => {
                    // AlreadyExists surfaces as a conflict and the next
                    // attempt takes the patch path
                    client.create(desired).await?;
                    ApplyAction::Created
                }
                Some(live) if is_subset(desired.as_value(), live.as_value()) => {
                    ApplyAction::Unchanged
                }
                Some(live) => {
                    let mut patch = desired.clone();
                    patch.set_resource_version(live.resource_version());
                    if attempt > 1 {
                        debug!(resource = %key_ref, attempt, "Re-patching after conflict");
                    }
                    client.patch(&patch, field_manager).await?;
                    ApplyAction::Updated
                }
            };
            Ok::<_, ClientError>(action)
        })
        .await;

        outcome.map_err(|e| match e {
            RetryError::Exhausted { attempts, .. } => Error::ConflictRetryExhausted {
                resource: key.to_string(),
                attempts,
            },
            RetryError::Failed(source) => apply_error(&key, source),
        })
    }

    /// Returns whether the object was still there to delete
    async fn delete(&self, key: &ResourceKey) -> Result<bool> {
        match self.client.delete(key).await {
            Ok(()) => {
                debug!(resource = %key, "Deleted resource");
                Ok(true)
            }
            Err(ClientError::NotFound) => Ok(false),
            Err(source) => Err(apply_error(key, source)),
        }
    }
}

fn apply_error(key: &ResourceKey, source: ClientError) -> Error {
    Error::Apply {
        resource: key.to_string(),
        source,
    }
}
