//! # Namespace Rewriting
//!
//! Moves every namespace-scoped resource in a rendered set into the target
//! namespace. Cluster-scoped kinds are left untouched; kinds not in the
//! list below are assumed to be namespace-scoped.

use super::document::ResourceDocument;

const CLUSTER_SCOPED_KINDS: &[&str] = &[
    // core and apiextensions
    "APIService",
    "CertificateSigningRequest",
    "ClusterRole",
    "ClusterRoleBinding",
    "CSIDriver",
    "CustomResourceDefinition",
    "FlowSchema",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PriorityClass",
    "PriorityLevelConfiguration",
    "RuntimeClass",
    "StorageClass",
    "ValidatingAdmissionPolicy",
    "ValidatingAdmissionPolicyBinding",
    "ValidatingWebhookConfiguration",
    "VolumeSnapshotClass",
    "VolumeSnapshotContent",
    // OpenShift
    "ClusterOperator",
    "ClusterResourceQuota",
    "ClusterVersion",
    "ConsoleCLIDownload",
    "ConsoleExternalLogLink",
    "ConsoleLink",
    "ConsoleNotification",
    "ConsolePlugin",
    "ConsoleQuickStart",
    "ConsoleYAMLSample",
    "Group",
    "Identity",
    "ImageContentSourcePolicy",
    "OAuthClient",
    "Project",
    "SecurityContextConstraints",
    "User",
    // operators and serving
    "ClusterIssuer",
    "ClusterServingRuntime",
    "ClusterStorageContainer",
];

#[must_use]
pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

/// Set `metadata.namespace` to `target` on every namespace-scoped resource
#[must_use]
pub fn rewrite_namespace(resources: Vec<ResourceDocument>, target: &str) -> Vec<ResourceDocument> {
    resources
        .into_iter()
        .map(|mut resource| {
            if !is_cluster_scoped(resource.kind()) {
                resource.set_namespace(target);
            }
            resource
        })
        .collect()
}
