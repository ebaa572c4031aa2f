//! # kustomize Binary Renderer
//!
//! Runs `kustomize build <dir>` and parses its multi-document output.

use crate::controller::manifests::{parse_yaml_stream, ResourceDocument};
use crate::error::RenderFailure;
use std::path::Path;
use std::process::Stdio;
use tracing::{debug, error};

/// Render `dir` with the `kustomize` binary found in `PATH`
///
/// # Errors
///
/// [`RenderFailure::Kustomize`] if the binary is missing or exits non-zero,
/// otherwise the parse failure of its output.
pub async fn render_directory(dir: &Path) -> Result<Vec<ResourceDocument>, RenderFailure> {
    let kustomize_path = which::which("kustomize")
        .map_err(|e| RenderFailure::Kustomize(format!("kustomize binary not found in PATH: {e}")))?;
    debug!("Using kustomize binary at: {:?}", kustomize_path);

    let output = tokio::process::Command::new(kustomize_path)
        .arg("build")
        .arg(dir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| RenderFailure::Kustomize(format!("failed to execute kustomize build: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Kustomize build failed: {}", stderr.trim());
        return Err(RenderFailure::Kustomize(stderr.trim().to_string()));
    }

    let yaml = String::from_utf8(output.stdout).map_err(|e| {
        RenderFailure::Kustomize(format!("kustomize output is not valid UTF-8: {e}"))
    })?;

    parse_yaml_stream(&yaml)
        .map_err(|source| RenderFailure::Yaml {
            path: dir.to_path_buf(),
            source,
        })?
        .into_iter()
        .map(|value| {
            ResourceDocument::from_value(value).map_err(|message| RenderFailure::InvalidDocument {
                path: dir.to_path_buf(),
                message,
            })
        })
        .collect()
}
