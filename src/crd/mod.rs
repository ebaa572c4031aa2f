//! # Custom Resource Definitions
//!
//! CRD types for the DataScienceCluster controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - DataScienceCluster specification and component settings
//! - `status.rs` - Status types for tracking reconciliation state

mod spec;
mod status;

pub use spec::{
    ComponentResources, ComponentSpec, Components, DataScienceCluster, DataScienceClusterSpec,
    DASHBOARD, SERVING, TRAINING, WORKBENCHES,
};
pub use status::{ClusterPhase, Condition, DataScienceClusterStatus};
