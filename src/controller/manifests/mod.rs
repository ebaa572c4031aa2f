//! # Manifests
//!
//! Rendered resource documents, the bundle provider that installs them on
//! disk, and the namespace rewriter applied before they reach the cluster.

pub mod bundle;
pub mod document;
pub mod merge;
pub mod namespace;

pub use bundle::BundleProvider;
pub use document::{parse_yaml_stream, ResourceDocument, ResourceKey};
pub use merge::{is_subset, merge_patch};
pub use namespace::{is_cluster_scoped, rewrite_namespace};
