//! DataScienceCluster Controller Library
//!
//! Profile-based reconciler for the `DataScienceCluster` custom resource.
//!
//! ## Quick Start
//!
//! ```rust
//! use datasciencecluster_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod error;
pub mod observability;
pub mod prelude;
pub mod runtime;
