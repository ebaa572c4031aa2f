//! # Apply
//!
//! Idempotent create/patch/delete of rendered resources against the cluster.

pub mod client;
pub mod engine;
pub mod retry;

pub use client::{KubeResourceClient, ResourceClient};
pub use engine::{ApplyAction, ApplyEngine, ApplySummary, ManagedScope};
pub use retry::{retry_on_conflict, ConflictAware, ConflictRetry, RetryError};

use crate::controller::manifests::ResourceDocument;

/// Apply order for a kind (lower goes first)
///
/// Namespaces and CRDs come before anything that may live in them or be an
/// instance of them; RBAC and configuration come before the workloads that
/// use them.
#[must_use]
pub fn kind_priority(kind: &str) -> u8 {
    match kind {
        "Namespace" => 0,
        "CustomResourceDefinition" => 1,
        "ServiceAccount" => 2,
        "ClusterRole" | "Role" => 3,
        "ClusterRoleBinding" | "RoleBinding" => 4,
        "ConfigMap" | "Secret" => 5,
        "PersistentVolumeClaim" => 6,
        "Service" => 7,
        "Deployment" | "DaemonSet" | "StatefulSet" => 8,
        "MutatingWebhookConfiguration" | "ValidatingWebhookConfiguration" => 9,
        _ => 10,
    }
}

/// Stable sort by [`kind_priority`]
#[must_use]
pub fn sort_for_apply(mut resources: Vec<ResourceDocument>) -> Vec<ResourceDocument> {
    resources.sort_by_key(|r| kind_priority(r.kind()));
    resources
}

/// Reverse of [`sort_for_apply`]: dependents first, Namespaces and CRDs last
#[must_use]
pub fn sort_for_delete(resources: Vec<ResourceDocument>) -> Vec<ResourceDocument> {
    let mut resources = sort_for_apply(resources);
    resources.reverse();
    resources
}
