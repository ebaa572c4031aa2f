//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Identity of this controller, used as the server-side apply field manager
/// and as the events reporter.
pub const CONTROLLER_NAME: &str = "datasciencecluster-controller";

/// Finalizer that blocks DataScienceCluster deletion until component cleanup completes
pub const FINALIZER: &str = "dsc-finalizer.operator.opendatahub.io";

/// Label stamped on every resource created by the controller
pub const GENERATED_RESOURCE_LABEL: &str = "opendatahub.io/generated-resource";

/// Label recording which component a managed resource belongs to
pub const COMPONENT_LABEL: &str = "datasciencecluster.opendatahub.io/component";

/// Label recording the name of the owning DataScienceCluster
pub const OWNER_LABEL: &str = "datasciencecluster.opendatahub.io/owner";

/// Event reason used when a reconciliation fails
pub const RECONCILE_ERROR_EVENT_REASON: &str = "DataScienceClusterReconcileError";

/// Event reason used when a reconciliation completes
pub const RECONCILE_COMPLETED_EVENT_REASON: &str = "DataScienceClusterReconcileCompleted";

/// Root directory holding the extracted component manifests
pub const DEFAULT_MANIFESTS_ROOT: &str = "/opt/odh-manifests";

/// Namespace that namespaced component resources are deployed into
pub const DEFAULT_APPLICATIONS_NAMESPACE: &str = "opendatahub";

/// Convention subdirectory rendered when no overlay is selected
pub const DEFAULT_OVERLAY_DIR: &str = "default";

/// Profile used when `spec.profile` is empty
pub const FULL_PROFILE: &str = "full";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default attempt budget for optimistic-concurrency retries
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 10;

/// Default pause between optimistic-concurrency attempts (milliseconds)
pub const DEFAULT_CONFLICT_RETRY_DELAY_MS: u64 = 100;

/// Default periodic resync interval after a successful reconcile (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Requeue delay after the finalizer was added (seconds)
pub const FINALIZER_ADDED_REQUEUE_SECS: u64 = 1;

/// Default minimum error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default maximum error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default bound on concurrently reconciled DataScienceClusters
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 4;

/// Default timeout for bundle downloads (seconds)
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Name of the managed-service addon whose presence enables the OSD extras
pub const MANAGED_SERVICE_ADDON: &str = "managed-odh";

/// Manifest directory applied on managed-service clusters
pub const MANAGED_SERVICE_MANIFESTS_DIR: &str = "osd-configs";

/// apiVersion of the managed-service addon resource
pub const MANAGED_SERVICE_ADDON_API_VERSION: &str = "addons.managed.openshift.io/v1alpha1";

/// Kind of the managed-service addon resource
pub const MANAGED_SERVICE_ADDON_KIND: &str = "Addon";

/// Condition tracking whether a reconcile is in flight
pub const CONDITION_PROGRESSING: &str = "Progressing";

/// Condition tracking the outcome of the last reconcile
pub const CONDITION_RECONCILE_COMPLETED: &str = "ReconcileCompleted";

/// Reason set on the Progressing condition when a reconcile starts
pub const REASON_RECONCILE_INIT: &str = "ReconcileInit";

/// Reason set on the conditions after a successful reconcile
pub const REASON_RECONCILE_COMPLETED: &str = "ReconcileCompleted";

/// Message set on ReconcileCompleted after a successful reconcile
pub const RECONCILE_COMPLETED_MESSAGE: &str = "DataScienceCluster resource reconciled successfully";
