//! # Kustomization Files
//!
//! The subset of the kustomize configuration format the native renderer
//! understands. Unknown fields are ignored.

use crate::error::RenderFailure;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File names kustomize recognizes, in lookup order
pub const KUSTOMIZATION_FILE_NAMES: &[&str] =
    &["kustomization.yaml", "kustomization.yml", "Kustomization"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
    #[serde(default)]
    pub resources: Vec<String>,
    /// Deprecated alias of `resources` still found in older bundles
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub patches: Vec<PatchEntry>,
    #[serde(default)]
    pub patches_strategic_merge: Vec<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub common_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub common_annotations: BTreeMap<String, String>,
}

/// One entry of `patches`: a file or an inline patch, optionally targeted
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchEntry {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub target: Option<PatchTarget>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatchTarget {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Kustomization {
    /// Entries of `resources` followed by `bases`
    pub fn all_resources(&self) -> impl Iterator<Item = &String> {
        self.resources.iter().chain(self.bases.iter())
    }
}

/// Locate the kustomization file inside `dir`, if any
#[must_use]
pub fn find_kustomization_file(dir: &Path) -> Option<PathBuf> {
    KUSTOMIZATION_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Read and parse the kustomization file at `path`
///
/// # Errors
///
/// [`RenderFailure::Io`] or [`RenderFailure::Yaml`].
pub fn load(path: &Path) -> Result<Kustomization, RenderFailure> {
    let content = std::fs::read_to_string(path).map_err(|source| RenderFailure::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(Kustomization::default());
    }
    serde_yaml::from_str(&content).map_err(|source| RenderFailure::Yaml {
        path: path.to_path_buf(),
        source,
    })
}
