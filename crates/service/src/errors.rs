//! Inference service error types

use thiserror::Error;

/// Request-visible service errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Artifacts are still loading; the client may retry
    #[error("Service is not ready yet")]
    NotReady,

    /// A classifier call failed; no partial answer is returned
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// API key missing or wrong
    #[error("Unauthorized")]
    Unauthorized,
}

impl ServiceError {
    /// Whether the client can expect a retry to succeed later
    pub fn retryable(&self) -> bool {
        matches!(self, ServiceError::NotReady)
    }
}
