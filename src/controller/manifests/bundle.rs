//! # Manifest Bundle Provider
//!
//! Fetches a gzip-compressed tarball of component manifests and installs it
//! at the manifests root.
//!
//! The archive is downloaded and unpacked inside a staging directory created
//! next to the root. Only a fully extracted tree is renamed into place, so a
//! failed or interrupted fetch never leaves a half-populated root behind. The
//! staging directory is a [`tempfile::TempDir`] and is removed on every exit
//! path, including when the reconcile future is dropped.
//!
//! An empty source URI means the manifests were provisioned with the image
//! and nothing is fetched.

use crate::error::{Error, Result};
use crate::observability::metrics;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

const ARCHIVE_FILE: &str = "bundle.tar.gz";
const EXTRACT_DIR: &str = "tree";
const PREVIOUS_DIR: &str = "previous";

/// Installs manifest bundles at a fixed root
#[derive(Debug)]
pub struct BundleProvider {
    root: PathBuf,
    http: reqwest::Client,
    expected_sha256: Option<String>,
    /// URI of the bundle currently installed at `root`
    installed: Mutex<Option<String>>,
}

impl BundleProvider {
    /// # Errors
    ///
    /// [`Error::Configuration`] if the HTTP client cannot be built.
    pub fn new(root: PathBuf, timeout: Duration, expected_sha256: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            root,
            http,
            expected_sha256,
            installed: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Make the bundle at `source_uri` available and return the manifests root
    ///
    /// A URI that was already installed by this provider is not fetched again.
    /// Concurrent callers are serialized.
    ///
    /// # Errors
    ///
    /// [`Error::Download`] for transport failures, non-200 responses and
    /// checksum mismatches; [`Error::Extract`] for anything that goes wrong
    /// unpacking or installing the archive.
    pub async fn obtain(&self, source_uri: &str) -> Result<PathBuf> {
        if source_uri.is_empty() {
            debug!(
                root = %self.root.display(),
                "No manifests URI configured, using pre-provisioned bundle"
            );
            return Ok(self.root.clone());
        }

        let mut installed = self.installed.lock().await;
        if installed.as_deref() == Some(source_uri) {
            return Ok(self.root.clone());
        }

        let span = info_span!("bundle.obtain", bundle.uri = source_uri);
        let start = Instant::now();
        metrics::increment_bundle_downloads_total();

        match self.install(source_uri).instrument(span).await {
            Ok(()) => {
                metrics::observe_bundle_download_duration(start.elapsed().as_secs_f64());
                info!(
                    "📦 Installed manifest bundle from {} into {}",
                    source_uri,
                    self.root.display()
                );
                *installed = Some(source_uri.to_string());
                Ok(self.root.clone())
            }
            Err(e) => {
                metrics::increment_bundle_download_errors_total(e.reason());
                warn!(error = %e, "Manifest bundle installation failed");
                Err(e)
            }
        }
    }

    async fn install(&self, source_uri: &str) -> Result<()> {
        let parent = self
            .root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| extract_error(format!("failed to create {}: {e}", parent.display())))?;

        let staging = tempfile::Builder::new()
            .prefix(".manifests-")
            .tempdir_in(parent)
            .map_err(|e| extract_error(format!("failed to create staging directory: {e}")))?;

        let archive = staging.path().join(ARCHIVE_FILE);
        self.download(source_uri, &archive).await?;

        if let Some(expected) = &self.expected_sha256 {
            verify_checksum(&archive, expected).map_err(|message| Error::Download {
                uri: source_uri.to_string(),
                message,
            })?;
        }
        verify_gzip_magic(&archive).map_err(extract_error)?;

        let tree = staging.path().join(EXTRACT_DIR);
        extract_archive(&archive, &tree).await?;
        promote(&tree, &self.root, &staging.path().join(PREVIOUS_DIR))
            .await
            .map_err(|e| {
                extract_error(format!(
                    "failed to install bundle at {}: {e}",
                    self.root.display()
                ))
            })?;

        // staging (archive and the replaced tree) is removed when it drops here
        Ok(())
    }

    async fn download(&self, uri: &str, destination: &Path) -> Result<u64> {
        let download_error = |message: String| Error::Download {
            uri: uri.to_string(),
            message,
        };

        info!("Downloading manifest bundle from {}", uri);
        let response = self
            .http
            .get(uri)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(download_error(format!(
                "unexpected HTTP status {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let expected_size = response.content_length();
        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| extract_error(format!("failed to create archive file: {e}")))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_error(format!("body read failed: {e}")))?;
            downloaded += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| extract_error(format!("failed to write archive: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| extract_error(format!("failed to write archive: {e}")))?;

        if let Some(expected) = expected_size {
            if downloaded != expected {
                return Err(download_error(format!(
                    "partial download: expected {expected} bytes, got {downloaded}"
                )));
            }
        }
        if downloaded == 0 {
            return Err(extract_error("downloaded bundle is empty".to_string()));
        }

        debug!(bytes = downloaded, "Bundle downloaded");
        Ok(downloaded)
    }
}

fn extract_error(message: String) -> Error {
    Error::Extract { message }
}

/// Compare the archive's SHA-256 against `expected` (`sha256:<hex>` or bare hex)
fn verify_checksum(archive: &Path, expected: &str) -> std::result::Result<(), String> {
    use sha2::{Digest, Sha256};
    use std::io::Read;

    let mut file = std::fs::File::open(archive)
        .map_err(|e| format!("failed to open bundle for checksum verification: {e}"))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| format!("failed to read bundle: {e}"))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let computed = format!("{:x}", hasher.finalize());
    let expected = expected.trim_start_matches("sha256:").to_ascii_lowercase();
    if computed != expected {
        return Err(format!(
            "checksum mismatch: expected sha256:{expected}, got sha256:{computed}"
        ));
    }
    debug!("Bundle checksum verified");
    Ok(())
}

/// gzip streams start with 1f 8b
fn verify_gzip_magic(archive: &Path) -> std::result::Result<(), String> {
    use std::io::Read;

    let mut magic = [0u8; 2];
    std::fs::File::open(archive)
        .and_then(|mut file| file.read_exact(&mut magic))
        .map_err(|e| format!("failed to read bundle header: {e}"))?;
    if magic != [0x1f, 0x8b] {
        return Err(format!(
            "bundle is not gzip-compressed (magic bytes {:02x}{:02x})",
            magic[0], magic[1]
        ));
    }
    Ok(())
}

/// Unpack `archive` into `destination`, dropping the top-level directory
async fn extract_archive(archive: &Path, destination: &Path) -> Result<()> {
    tokio::fs::create_dir_all(destination)
        .await
        .map_err(|e| extract_error(format!("failed to create extraction directory: {e}")))?;

    let output = tokio::process::Command::new("tar")
        .arg("-xzf")
        .arg(archive)
        .arg("-C")
        .arg(destination)
        .arg("--strip-components=1")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| extract_error(format!("failed to run tar: {e}")))?;

    if !output.status.success() {
        return Err(extract_error(format!(
            "corrupt or invalid archive: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let mut entries = tokio::fs::read_dir(destination)
        .await
        .map_err(|e| extract_error(format!("failed to read extracted bundle: {e}")))?;
    let has_entries = entries
        .next_entry()
        .await
        .map_err(|e| extract_error(format!("failed to read extracted bundle: {e}")))?
        .is_some();
    if !has_entries {
        return Err(extract_error("bundle extracted to an empty tree".to_string()));
    }
    Ok(())
}

/// Swap `tree` into `root`, parking any existing root at `previous`
async fn promote(tree: &Path, root: &Path, previous: &Path) -> std::io::Result<()> {
    let had_previous = match tokio::fs::rename(root, previous).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };

    if let Err(e) = tokio::fs::rename(tree, root).await {
        if had_previous {
            if let Err(restore) = tokio::fs::rename(previous, root).await {
                warn!(error = %restore, "Failed to restore previous manifests root");
            }
        }
        return Err(e);
    }
    Ok(())
}
