//! # Native Renderer
//!
//! Builds a kustomization directory without the `kustomize` binary.
//!
//! Resources are collected in declaration order. Nested kustomizations are
//! built first and their output is then patched, labelled and namespaced by
//! the including directory, so overlays take precedence over their bases.

use super::kustomization::{self, Kustomization, PatchEntry};
use crate::controller::manifests::{
    merge_patch, parse_yaml_stream, rewrite_namespace, ResourceDocument,
};
use crate::error::RenderFailure;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Render the kustomization found in `dir`
///
/// # Errors
///
/// Any [`RenderFailure`] encountered while walking the tree.
pub fn render_directory(dir: &Path) -> Result<Vec<ResourceDocument>, RenderFailure> {
    let mut stack = Vec::new();
    let resources = build(dir, &mut stack)?;

    let mut seen = HashSet::new();
    for resource in &resources {
        if !seen.insert(resource.key()) {
            return Err(RenderFailure::DuplicateResource(resource.key().to_string()));
        }
    }
    Ok(resources)
}

fn build(dir: &Path, stack: &mut Vec<PathBuf>) -> Result<Vec<ResourceDocument>, RenderFailure> {
    let canonical = dir.canonicalize().map_err(|source| RenderFailure::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    if stack.contains(&canonical) {
        return Err(RenderFailure::Cycle(dir.to_path_buf()));
    }

    let file = kustomization::find_kustomization_file(dir)
        .ok_or_else(|| RenderFailure::MissingBase(dir.to_path_buf()))?;
    let kustomization = kustomization::load(&file)?;
    debug!(path = %dir.display(), "Rendering kustomization");

    stack.push(canonical);
    let mut resources = Vec::new();
    for entry in kustomization.all_resources() {
        let path = dir.join(entry);
        if path.is_dir() {
            resources.extend(build(&path, stack)?);
        } else {
            resources.extend(read_documents(&path)?);
        }
    }
    stack.pop();

    apply_patches(dir, &kustomization, &mut resources)?;
    apply_common_metadata(&kustomization, &mut resources);
    Ok(match &kustomization.namespace {
        Some(namespace) if !namespace.is_empty() => rewrite_namespace(resources, namespace),
        _ => resources,
    })
}

/// Parse every document in a manifest file
fn read_documents(path: &Path) -> Result<Vec<ResourceDocument>, RenderFailure> {
    read_values(path)?
        .into_iter()
        .map(|value| {
            ResourceDocument::from_value(value).map_err(|message| RenderFailure::InvalidDocument {
                path: path.to_path_buf(),
                message,
            })
        })
        .collect()
}

fn read_values(path: &Path) -> Result<Vec<Value>, RenderFailure> {
    let content = std::fs::read_to_string(path).map_err(|source| RenderFailure::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_values(path, &content)
}

fn parse_values(path: &Path, content: &str) -> Result<Vec<Value>, RenderFailure> {
    parse_yaml_stream(content).map_err(|source| RenderFailure::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_patches(
    dir: &Path,
    kustomization: &Kustomization,
    resources: &mut [ResourceDocument],
) -> Result<(), RenderFailure> {
    for file in &kustomization.patches_strategic_merge {
        let path = dir.join(file);
        for patch in read_values(&path)? {
            apply_patch(&path, &patch, None, None, resources)?;
        }
    }

    for entry in &kustomization.patches {
        let (path, patches) = load_patch_entry(dir, entry)?;
        let kind = entry.target.as_ref().and_then(|t| t.kind.as_deref());
        let name = entry.target.as_ref().and_then(|t| t.name.as_deref());
        for patch in patches {
            apply_patch(&path, &patch, kind, name, resources)?;
        }
    }
    Ok(())
}

fn load_patch_entry(dir: &Path, entry: &PatchEntry) -> Result<(PathBuf, Vec<Value>), RenderFailure> {
    match (&entry.path, &entry.patch) {
        (Some(file), _) => {
            let path = dir.join(file);
            let values = read_values(&path)?;
            Ok((path, values))
        }
        (None, Some(inline)) => {
            let path = dir.to_path_buf();
            let values = parse_values(&path, inline)?;
            Ok((path, values))
        }
        (None, None) => Err(RenderFailure::InvalidDocument {
            path: dir.to_path_buf(),
            message: "patch entry has neither path nor patch".to_string(),
        }),
    }
}

/// Merge `patch` into the resource matching the target, or the patch's own kind and name
fn apply_patch(
    source: &Path,
    patch: &Value,
    target_kind: Option<&str>,
    target_name: Option<&str>,
    resources: &mut [ResourceDocument],
) -> Result<(), RenderFailure> {
    let kind = target_kind.or_else(|| patch.get("kind").and_then(Value::as_str));
    let name = target_name.or_else(|| {
        patch
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
    });
    let (Some(kind), Some(name)) = (kind, name) else {
        return Err(RenderFailure::InvalidDocument {
            path: source.to_path_buf(),
            message: "patch does not identify a target kind and name".to_string(),
        });
    };

    let target = resources
        .iter_mut()
        .find(|r| r.kind() == kind && r.name() == name)
        .ok_or_else(|| RenderFailure::PatchTargetNotFound {
            path: source.to_path_buf(),
            target: format!("{kind}/{name}"),
        })?;

    let mut patch = patch.clone();
    if target_kind.is_some() || target_name.is_some() {
        // a targeted patch must not rename or re-kind what it patches
        if let Value::Object(fields) = &mut patch {
            fields.remove("apiVersion");
            fields.remove("kind");
            if let Some(Value::Object(metadata)) = fields.get_mut("metadata") {
                metadata.remove("name");
            }
        }
    }
    merge_patch(target.as_value_mut(), &patch);
    Ok(())
}

fn apply_common_metadata(kustomization: &Kustomization, resources: &mut [ResourceDocument]) {
    for resource in resources {
        for (key, value) in &kustomization.common_labels {
            resource.set_label(key, value);
        }
        for (key, value) in &kustomization.common_annotations {
            resource.set_annotation(key, value);
        }
    }
}
