//! # Manifest Renderer
//!
//! Turns a component's manifest directory into a concrete resource set.
//!
//! A component directory either holds a kustomization itself or contains
//! overlay subdirectories (`default` being the fallback). Two backends are
//! available: the in-process [`render`] walker and the `kustomize` binary.

pub mod binary;
pub mod kustomization;
pub mod render;

use crate::constants::DEFAULT_OVERLAY_DIR;
use crate::controller::manifests::ResourceDocument;
use crate::error::{Error, RenderFailure, Result};
use crate::observability::metrics;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

/// Which backend renders kustomizations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RendererMode {
    #[default]
    Native,
    Kustomize,
}

impl FromStr for RendererMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "kustomize" => Ok(Self::Kustomize),
            other => Err(format!(
                "unknown renderer '{other}' (expected 'native' or 'kustomize')"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestRenderer {
    mode: RendererMode,
}

impl ManifestRenderer {
    #[must_use]
    pub fn new(mode: RendererMode) -> Self {
        Self { mode }
    }

    /// Render `base_path`, preferring the `overlay` subdirectory
    ///
    /// # Errors
    ///
    /// [`Error::Render`] wrapping the underlying [`RenderFailure`].
    pub async fn render(
        &self,
        base_path: &Path,
        overlay: Option<&str>,
    ) -> Result<Vec<ResourceDocument>> {
        let span = info_span!(
            "manifests.render",
            render.path = %base_path.display(),
            render.overlay = overlay.unwrap_or(""),
        );
        let start = Instant::now();

        let result: std::result::Result<Vec<ResourceDocument>, RenderFailure> = async {
            let dir = select_directory(base_path, overlay)?;
            debug!(directory = %dir.display(), mode = ?self.mode, "Selected kustomization directory");
            match self.mode {
                RendererMode::Native => render::render_directory(&dir),
                RendererMode::Kustomize => binary::render_directory(&dir).await,
            }
        }
        .instrument(span)
        .await;

        metrics::observe_render_duration(start.elapsed().as_secs_f64());
        result.map_err(|source| {
            metrics::increment_render_errors_total();
            Error::Render {
                path: base_path.to_path_buf(),
                source,
            }
        })
    }
}

/// Pick the directory to build: the overlay, the base itself, then `default`
///
/// # Errors
///
/// [`RenderFailure::MissingBase`] when none of the candidates holds a
/// kustomization file.
pub fn select_directory(
    base_path: &Path,
    overlay: Option<&str>,
) -> std::result::Result<PathBuf, RenderFailure> {
    let has_kustomization = |dir: &Path| kustomization::find_kustomization_file(dir).is_some();

    match overlay {
        Some(overlay) => {
            let candidate = base_path.join(overlay);
            if has_kustomization(&candidate) {
                return Ok(candidate);
            }
        }
        None if has_kustomization(base_path) => return Ok(base_path.to_path_buf()),
        None => {}
    }

    let fallback = base_path.join(DEFAULT_OVERLAY_DIR);
    if has_kustomization(&fallback) {
        return Ok(fallback);
    }
    Err(RenderFailure::MissingBase(base_path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn kustomization(dir: &Path) {
        fs::create_dir_all(dir).expect("create dir");
        fs::write(dir.join("kustomization.yaml"), "resources: []\n").expect("write");
    }

    #[test]
    fn test_overlay_preferred_over_default() {
        let dir = tempfile::tempdir().expect("temp dir");
        kustomization(&dir.path().join("odh"));
        kustomization(&dir.path().join("default"));

        assert_eq!(
            select_directory(dir.path(), Some("odh")).expect("found"),
            dir.path().join("odh")
        );
        assert_eq!(
            select_directory(dir.path(), Some("missing")).expect("fallback"),
            dir.path().join("default")
        );
    }

    #[test]
    fn test_base_used_without_overlay() {
        let dir = tempfile::tempdir().expect("temp dir");
        kustomization(dir.path());
        kustomization(&dir.path().join("default"));
        assert_eq!(
            select_directory(dir.path(), None).expect("base"),
            dir.path().to_path_buf()
        );
    }

    #[test]
    fn test_missing_base() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            select_directory(dir.path(), None),
            Err(RenderFailure::MissingBase(_))
        ));
    }

    #[test]
    fn test_renderer_mode_parsing() {
        assert_eq!("native".parse::<RendererMode>(), Ok(RendererMode::Native));
        assert_eq!("Kustomize".parse::<RendererMode>(), Ok(RendererMode::Kustomize));
        assert!("helm".parse::<RendererMode>().is_err());
    }

    #[tokio::test]
    async fn test_render_wraps_failures() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = ManifestRenderer::default()
            .render(dir.path(), None)
            .await
            .expect_err("missing base");
        assert_eq!(err.reason(), "RenderError");
    }
}
