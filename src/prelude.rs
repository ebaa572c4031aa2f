//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use datasciencecluster_controller::prelude::*;
//! ```

pub use crate::crd::*;

pub use crate::controller::reconciler::{
    reconcile, ClusterStore, EventSeverity, KubeClusterStore, ReconcileOutcome, Reconciler,
};

pub use crate::controller::apply::{
    ApplyAction, ApplyEngine, ApplySummary, KubeResourceClient, ManagedScope, ResourceClient,
};

pub use crate::controller::profiles::{resolve, ComponentOverride, ProfileTable, ReconciliationPlan};

pub use crate::config::ControllerConfig;

pub use crate::error::{ClientError, Error, RenderFailure, Result};
