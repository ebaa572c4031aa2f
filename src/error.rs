//! # Errors
//!
//! Error taxonomy for the reconcile pipeline.
//!
//! [`Error`] is what a reconcile returns; every variant maps to a stable
//! [`Error::reason`] used for status conditions, events and metric labels.
//! [`ClientError`] classifies failures of the remote API so the apply engine
//! and the finalizer loop can tell version conflicts from everything else.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reconcile pipeline failures
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown profile or invalid controller configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Bundle could not be fetched (network failure, non-200 status, checksum mismatch)
    #[error("failed to download manifests from {uri}: {message}")]
    Download { uri: String, message: String },

    /// Bundle archive could not be unpacked or promoted into place
    #[error("failed to extract manifest bundle: {message}")]
    Extract { message: String },

    /// Manifests could not be rendered
    #[error("failed to render manifests at {}: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: RenderFailure,
    },

    /// Remote read/create/patch/delete failed for a reason other than a version conflict
    #[error("failed to apply {resource}: {source}")]
    Apply {
        resource: String,
        #[source]
        source: ClientError,
    },

    /// Optimistic-concurrency retries were used up
    #[error("gave up on {resource} after {attempts} conflicting attempts")]
    ConflictRetryExhausted { resource: String, attempts: u32 },

    /// Status, finalizer or event persistence failed
    #[error("failed to update DataScienceCluster {name}: {source}")]
    StatusUpdate {
        name: String,
        #[source]
        source: ClientError,
    },
}

impl Error {
    /// Stable machine-readable reason, used as condition reason and metric label
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::Download { .. } => "DownloadError",
            Error::Extract { .. } => "ExtractError",
            Error::Render { .. } => "RenderError",
            Error::Apply { .. } => "ApplyError",
            Error::ConflictRetryExhausted { .. } => "ConflictRetryExhausted",
            Error::StatusUpdate { .. } => "StatusUpdateError",
        }
    }
}

/// Failures reported by the remote orchestration API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("not found")]
    NotFound,

    /// HTTP 409: stale resourceVersion or already exists
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("api error {code}: {message}")]
    Api { code: u16, message: String },

    /// The API server does not serve this apiVersion/kind
    #[error("no API resource serves {api_version}/{kind}")]
    UnknownKind { api_version: String, kind: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid object: {0}")]
    Invalid(String),
}

impl ClientError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }
}

impl From<kube::Error> for ClientError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) if response.code == 404 => ClientError::NotFound,
            kube::Error::Api(response) if response.code == 409 => {
                ClientError::Conflict(response.message)
            }
            kube::Error::Api(response) => ClientError::Api {
                code: response.code,
                message: response.message,
            },
            kube::Error::SerdeError(e) => ClientError::Invalid(e.to_string()),
            other => ClientError::Transport(other.to_string()),
        }
    }
}

/// Underlying cause of a [`Error::Render`]
#[derive(Debug, Error)]
pub enum RenderFailure {
    #[error("no kustomization found in {} or its default overlay", .0.display())]
    MissingBase(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid resource in {}: {message}", path.display())]
    InvalidDocument { path: PathBuf, message: String },

    #[error("patch in {} matches no resource ({target})", path.display())]
    PatchTargetNotFound { path: PathBuf, target: String },

    #[error("resource {0} is declared more than once")]
    DuplicateResource(String),

    #[error("cyclic reference to {}", .0.display())]
    Cycle(PathBuf),

    #[error("kustomize build failed: {0}")]
    Kustomize(String),
}
