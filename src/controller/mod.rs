//! # Controller
//!
//! Core controller modules for the DataScienceCluster controller.
//!
//! - `profiles`: profile table and plan resolution
//! - `components`: registry of managed components
//! - `manifests`: resource documents, namespace rewriting and bundle download
//! - `kustomize`: manifest rendering (native or `kustomize` binary)
//! - `apply`: create/patch/delete against the cluster with conflict retries
//! - `backoff`: Fibonacci backoff for failed reconciles
//! - `reconciler`: the per-object state machine
//! - `server`: HTTP server for metrics and health checks

pub mod apply;
pub mod backoff;
pub mod components;
pub mod kustomize;
pub mod manifests;
pub mod profiles;
pub mod reconciler;
pub mod server;
