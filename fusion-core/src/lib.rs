//! Domain models for fusion-viewer.

pub mod models;

pub use models::*;
