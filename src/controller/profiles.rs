//! # Profile Resolution
//!
//! Maps a DataScienceCluster profile plus per-component overrides to a
//! [`ReconciliationPlan`].
//!
//! Profiles are looked up in a [`ProfileTable`] passed in by the caller, so
//! tests and operators can supply their own profile sets. The built-in table
//! carries the `serving`, `training`, `workbench` and `full` profiles.
//!
//! ## Usage
//!
//! ```rust
//! use datasciencecluster_controller::controller::profiles::{resolve, ProfileTable};
//! use std::collections::HashMap;
//!
//! let components = ["dashboard", "serving", "training", "workbenches"]
//!     .map(String::from);
//! let plan = resolve("serving", &HashMap::new(), &components, &ProfileTable::builtin())
//!     .expect("serving is a built-in profile");
//! assert!(plan.is_enabled("serving"));
//! assert!(!plan.is_enabled("training"));
//! ```

use crate::constants::FULL_PROFILE;
use crate::crd::{DASHBOARD, SERVING, TRAINING, WORKBENCHES};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Explicit per-component enablement from `spec.components`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComponentOverride {
    /// Defer to the profile default
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl From<Option<bool>> for ComponentOverride {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => ComponentOverride::Unset,
            Some(true) => ComponentOverride::Enabled,
            Some(false) => ComponentOverride::Disabled,
        }
    }
}

/// Default component enablement per profile name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileTable {
    profiles: BTreeMap<String, BTreeMap<String, bool>>,
}

impl ProfileTable {
    /// Profiles shipped with the controller
    #[must_use]
    pub fn builtin() -> Self {
        let profile = |serving, training, workbenches, dashboard| {
            BTreeMap::from([
                (SERVING.to_string(), serving),
                (TRAINING.to_string(), training),
                (WORKBENCHES.to_string(), workbenches),
                (DASHBOARD.to_string(), dashboard),
            ])
        };

        Self {
            profiles: BTreeMap::from([
                ("serving".to_string(), profile(true, false, false, true)),
                ("training".to_string(), profile(false, true, false, true)),
                ("workbench".to_string(), profile(false, false, true, true)),
                (FULL_PROFILE.to_string(), profile(true, true, true, true)),
            ]),
        }
    }

    /// Build a table from explicit profile definitions
    #[must_use]
    pub fn new(profiles: BTreeMap<String, BTreeMap<String, bool>>) -> Self {
        Self { profiles }
    }

    /// Parse a table from YAML of the form `profiles: {name: {component: bool}}`
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::Configuration(format!("invalid profile table: {e}")))
    }

    /// Load a table from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "failed to read profile table {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&contents)
    }

    #[must_use]
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    fn defaults(&self, profile: &str) -> Option<&BTreeMap<String, bool>> {
        self.profiles.get(profile)
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Enablement decision for every registered component
///
/// Recomputed on every reconcile and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    components: BTreeMap<String, bool>,
}

impl ReconciliationPlan {
    /// Whether the component is enabled; unregistered components are disabled
    #[must_use]
    pub fn is_enabled(&self, component: &str) -> bool {
        self.components.get(component).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.components
    }
}

/// Resolve the plan for `profile`
///
/// An override wins over the profile default. An empty profile selects
/// `full`; if the table has no `full` entry every component defaults to
/// enabled. Components missing from a known profile default to disabled.
///
/// # Errors
///
/// [`Error::Configuration`] if `profile` is not in `table`.
pub fn resolve(
    profile: &str,
    overrides: &HashMap<String, ComponentOverride>,
    registered: &[String],
    table: &ProfileTable,
) -> Result<ReconciliationPlan> {
    let profile = if profile.is_empty() {
        FULL_PROFILE
    } else {
        profile
    };

    let defaults = match table.defaults(profile) {
        Some(defaults) => Some(defaults),
        None if profile == FULL_PROFILE => None,
        None => {
            return Err(Error::Configuration(format!(
                "unknown profile '{profile}' (known profiles: {})",
                table.profile_names().join(", ")
            )));
        }
    };

    let components = registered
        .iter()
        .map(|component| {
            let default = defaults.map_or(true, |d| d.get(component).copied().unwrap_or(false));
            let enabled = match overrides.get(component).copied().unwrap_or_default() {
                ComponentOverride::Enabled => true,
                ComponentOverride::Disabled => false,
                ComponentOverride::Unset => default,
            };
            (component.clone(), enabled)
        })
        .collect();

    Ok(ReconciliationPlan { components })
}
