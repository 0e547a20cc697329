//! HTTP inference service for survey triage models
//!
//! Thin warp adapter around `triage-core`: the artifact set loads once at
//! startup, every request shares the resulting immutable predictor, and a
//! failed load leaves the process up but answering with clear errors.

pub mod config;
pub mod errors;
pub mod loader;
pub mod routes;
pub mod state;
pub mod types;

pub use config::ServiceConfig;
pub use errors::ServiceError;
pub use loader::load_predictor;
pub use routes::routes;
pub use state::{ServiceState, SharedState};

/// Crate version string reported by the health endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
