//! fusion-viewer: same-origin mediator between a 3D viewer and a job-based
//! generation backend.
//!
//! - [`backend`]: gateway client for the generation backend.
//! - [`proxy`]: resolve-then-fetch of a job's manifest and scene.
//! - [`api`]: the proxy's HTTP surface.
//! - [`poller`]: fixed-interval job status polling.
//! - [`viewer`]: one viewer session per displayed job.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod poller;
pub mod proxy;
pub mod viewer;

pub use error::{Error, Result};
pub use fusion_core as models;
