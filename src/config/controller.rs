//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::controller::apply::ConflictRetry;
use crate::controller::kustomize::RendererMode;
use crate::error::{Error, Result};
use crate::observability::LogFormat;
use std::path::PathBuf;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace that namespaced component resources are deployed into
    pub applications_namespace: String,
    /// Directory holding `<component>/<overlay>/kustomization.yaml` trees
    pub manifests_root: PathBuf,
    /// tar.gz bundle to install at `manifests_root`; empty means pre-provisioned
    pub manifests_uri: String,
    /// Expected digest of the bundle (`sha256:<hex>` or bare hex)
    pub manifests_sha256: Option<String>,
    /// Overlay rendered for every component instead of `default`
    pub manifests_overlay: Option<String>,
    pub renderer: RendererMode,
    /// YAML file replacing the built-in profile table
    pub profiles_config_path: Option<PathBuf>,
    /// Server-side apply field manager
    pub field_manager: String,
    /// Attempt budget for optimistic-concurrency loops
    pub max_conflict_retries: u32,
    pub conflict_retry_delay_ms: u64,
    /// Requeue interval after a successful reconcile (seconds)
    pub resync_interval_secs: u64,
    /// Fibonacci error backoff bounds (seconds)
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    /// Limits how many DataScienceClusters are reconciled simultaneously
    pub max_concurrent_reconciliations: u16,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    pub log_format: LogFormat,
    /// Timeout for the whole bundle download (seconds)
    pub download_timeout_secs: u64,
    /// Delay before restarting the controller stream after it ends (seconds)
    pub watch_restart_delay_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            applications_namespace: DEFAULT_APPLICATIONS_NAMESPACE.to_string(),
            manifests_root: PathBuf::from(DEFAULT_MANIFESTS_ROOT),
            manifests_uri: String::new(),
            manifests_sha256: None,
            manifests_overlay: None,
            renderer: RendererMode::Native,
            profiles_config_path: None,
            field_manager: CONTROLLER_NAME.to_string(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            conflict_retry_delay_ms: DEFAULT_CONFLICT_RETRY_DELAY_MS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_format: LogFormat::Text,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for an unknown `RENDERER`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unparseable numbers fall back to their defaults; empty strings count
    /// as unset.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for an unknown `RENDERER`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| -> u64 {
            string(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let renderer = match string("RENDERER") {
            Some(value) => value.parse().map_err(Error::Configuration)?,
            None => defaults.renderer,
        };
        let log_format = match string("LOG_FORMAT") {
            Some(value) => value.parse().map_err(Error::Configuration)?,
            None => defaults.log_format,
        };

        Ok(Self {
            applications_namespace: string("APPLICATIONS_NAMESPACE")
                .unwrap_or(defaults.applications_namespace),
            manifests_root: string("MANIFESTS_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.manifests_root),
            manifests_uri: string("MANIFESTS_URI").unwrap_or(defaults.manifests_uri),
            manifests_sha256: string("MANIFESTS_SHA256"),
            manifests_overlay: string("MANIFESTS_OVERLAY"),
            renderer,
            profiles_config_path: string("PROFILES_CONFIG_PATH").map(PathBuf::from),
            field_manager: string("FIELD_MANAGER").unwrap_or(defaults.field_manager),
            max_conflict_retries: u32::try_from(number(
                "MAX_CONFLICT_RETRIES",
                u64::from(defaults.max_conflict_retries),
            ))
            .unwrap_or(defaults.max_conflict_retries),
            conflict_retry_delay_ms: number(
                "CONFLICT_RETRY_DELAY_MS",
                defaults.conflict_retry_delay_ms,
            ),
            resync_interval_secs: number("RESYNC_INTERVAL_SECS", defaults.resync_interval_secs),
            backoff_min_secs: number("BACKOFF_MIN_SECS", defaults.backoff_min_secs),
            backoff_max_secs: number("BACKOFF_MAX_SECS", defaults.backoff_max_secs),
            max_concurrent_reconciliations: u16::try_from(number(
                "MAX_CONCURRENT_RECONCILIATIONS",
                u64::from(defaults.max_concurrent_reconciliations),
            ))
            .unwrap_or(defaults.max_concurrent_reconciliations),
            metrics_port: u16::try_from(number("METRICS_PORT", u64::from(defaults.metrics_port)))
                .unwrap_or(defaults.metrics_port),
            log_format,
            download_timeout_secs: number("DOWNLOAD_TIMEOUT_SECS", defaults.download_timeout_secs),
            watch_restart_delay_secs: number(
                "WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
        })
    }

    /// Get conflict retry policy
    #[must_use]
    pub fn conflict_retry(&self) -> ConflictRetry {
        ConflictRetry::new(
            self.max_conflict_retries,
            Duration::from_millis(self.conflict_retry_delay_ms),
        )
    }

    /// Get resync interval duration
    #[must_use]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Get download timeout duration
    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}
