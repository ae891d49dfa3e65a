//! Domain models for fusion-viewer.
//!
//! # Core Concepts
//!
//! - [`Job`]: One asynchronous generation request, identified by a backend-assigned [`JobId`].
//!   This crate never writes job state; the backend owns it and we only read [`JobStatus`].
//! - [`PresignedLocation`]: Time-limited URLs for a completed job's artifacts. Either field may
//!   be absent while the artifact has not been produced yet.
//! - [`Manifest`]: Backend-authored metadata for a completed job. Only a handful of fields are
//!   consumed; the rest is carried through untouched.

mod job;
mod manifest;
mod presign;

pub use job::*;
pub use manifest::*;
pub use presign::*;
