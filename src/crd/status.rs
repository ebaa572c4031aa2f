//! # DataScienceCluster Status
//!
//! Status types for tracking reconciliation state and conditions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of the DataScienceCluster resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataScienceClusterStatus {
    /// Current phase of reconciliation
    /// Values: Progressing, Ready, Error (absent until the first reconcile)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ClusterPhase>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation last reconciled successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Last successful reconciliation time (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<String>,
    /// Enablement of each component as of the last successful reconcile
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub installed_components: BTreeMap<String, bool>,
}

impl DataScienceClusterStatus {
    /// Phase with an absent value read as `Uninitialized`
    #[must_use]
    pub fn current_phase(&self) -> ClusterPhase {
        self.phase.unwrap_or(ClusterPhase::Uninitialized)
    }

    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }
}

/// Lifecycle phase of a DataScienceCluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ClusterPhase {
    #[default]
    Uninitialized,
    Progressing,
    Ready,
    Error,
}

impl ClusterPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterPhase::Uninitialized => "Uninitialized",
            ClusterPhase::Progressing => "Progressing",
            ClusterPhase::Ready => "Ready",
            ClusterPhase::Error => "Error",
        }
    }
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}
