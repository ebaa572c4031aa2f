//! # DataScienceCluster Spec
//!
//! Main CRD specification: a profile plus per-component overrides.

use crate::controller::profiles::ComponentOverride;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Component names known to the CRD, in reconcile order
pub const DASHBOARD: &str = "dashboard";
pub const TRAINING: &str = "training";
pub const SERVING: &str = "serving";
pub const WORKBENCHES: &str = "workbenches";

/// DataScienceCluster Custom Resource Definition
///
/// Declares which data science components should be deployed. The profile
/// selects default enablement; `components.<name>.enabled` overrides it.
///
/// # Example
///
/// ```yaml
/// apiVersion: datasciencecluster.opendatahub.io/v1alpha1
/// kind: DataScienceCluster
/// metadata:
///   name: default
/// spec:
///   profile: serving
///   components:
///     training:
///       enabled: true
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "DataScienceCluster",
    group = "datasciencecluster.opendatahub.io",
    version = "v1alpha1",
    status = "crate::crd::DataScienceClusterStatus",
    shortname = "dsc",
    printcolumn = r#"{"name":"Profile", "type":"string", "jsonPath":".spec.profile"}, {"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DataScienceClusterSpec {
    /// Profile providing default component enablement
    /// Values: serving, training, workbench, full
    /// Empty selects the full profile
    #[serde(default)]
    pub profile: String,
    /// Per-component overrides
    #[serde(default)]
    pub components: Components,
}

/// Per-component configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default)]
    pub dashboard: ComponentSpec,
    #[serde(default)]
    pub training: ComponentSpec,
    #[serde(default)]
    pub serving: ComponentSpec,
    #[serde(default)]
    pub workbenches: ComponentSpec,
}

impl Components {
    /// Look up a component by its registered name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        match name {
            DASHBOARD => Some(&self.dashboard),
            TRAINING => Some(&self.training),
            SERVING => Some(&self.serving),
            WORKBENCHES => Some(&self.workbenches),
            _ => None,
        }
    }

    /// Overrides keyed by component name, ready for the profile resolver
    #[must_use]
    pub fn overrides(&self) -> HashMap<String, ComponentOverride> {
        [DASHBOARD, TRAINING, SERVING, WORKBENCHES]
            .into_iter()
            .filter_map(|name| {
                self.get(name)
                    .map(|component| (name.to_string(), ComponentOverride::from(component.enabled)))
            })
            .collect()
    }
}

/// Settings for a single component
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Explicit enablement; unset defers to the profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Replica count passed through to the component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Compute resources passed through to the component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ComponentResources>,
}

/// Compute resource requests and limits, keyed by resource name (cpu, memory, ...)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentResources {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
}
