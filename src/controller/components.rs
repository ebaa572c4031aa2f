//! # Component Registry
//!
//! The ordered set of components the controller knows how to deploy, and
//! where each one's manifests live under the bundle root.

use crate::constants::MANAGED_SERVICE_MANIFESTS_DIR;
use crate::crd::{DASHBOARD, SERVING, TRAINING, WORKBENCHES};

/// A deployable component and the location of its manifests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Name used in `spec.components`, the plan and the component label
    pub name: String,
    /// Directory below the bundle root (`<root>/<manifest_dir>`)
    pub manifest_dir: String,
    /// Overlay rendered instead of the `default` convention directory
    pub overlay: Option<String>,
}

impl ComponentDescriptor {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            manifest_dir: name.to_string(),
            overlay: None,
        }
    }

    #[must_use]
    pub fn with_overlay(mut self, overlay: Option<String>) -> Self {
        self.overlay = overlay;
        self
    }
}

/// Components in reconcile order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRegistry {
    components: Vec<ComponentDescriptor>,
}

impl ComponentRegistry {
    /// dashboard, training, serving, workbenches
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(
            [DASHBOARD, TRAINING, SERVING, WORKBENCHES]
                .into_iter()
                .map(ComponentDescriptor::new)
                .collect(),
        )
    }

    #[must_use]
    pub fn new(components: Vec<ComponentDescriptor>) -> Self {
        Self { components }
    }

    /// Apply the same overlay to every component that has none of its own
    #[must_use]
    pub fn with_default_overlay(mut self, overlay: Option<&str>) -> Self {
        if let Some(overlay) = overlay {
            for component in &mut self.components {
                if component.overlay.is_none() {
                    component.overlay = Some(overlay.to_string());
                }
            }
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.components.iter()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.components.iter().map(|c| c.name.clone()).collect()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Extra manifests applied only on managed-service clusters
#[must_use]
pub fn managed_service_extras() -> ComponentDescriptor {
    ComponentDescriptor::new(MANAGED_SERVICE_MANIFESTS_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        assert_eq!(
            ComponentRegistry::builtin().names(),
            vec!["dashboard", "training", "serving", "workbenches"]
        );
    }

    #[test]
    fn test_default_overlay_keeps_explicit_overlays() {
        let registry = ComponentRegistry::new(vec![
            ComponentDescriptor::new("a"),
            ComponentDescriptor::new("b").with_overlay(Some("odh".into())),
        ])
        .with_default_overlay(Some("rhoai"));

        let overlays: Vec<_> = registry.iter().map(|c| c.overlay.clone()).collect();
        assert_eq!(overlays, vec![Some("rhoai".into()), Some("odh".into())]);
    }
}
