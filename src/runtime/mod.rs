//! # Runtime
//!
//! - `initialization`: start-up wiring
//! - `watch_loop`: the kube-runtime controller loop
//! - `error_policy`: per-object requeue backoff

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
