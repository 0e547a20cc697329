//! Error types for the triage core

use thiserror::Error;

/// Errors that can occur in the triage core
#[derive(Error, Debug)]
pub enum CoreError {
    /// A required artifact member is absent or unreadable
    #[error("Artifact member missing or unreadable: {0}")]
    ArtifactMissing(String),

    /// Artifact members do not belong to the same training run
    #[error("Artifact set mismatch: {0}")]
    ArtifactMismatch(String),

    /// A label code fell outside a vocabulary's dense range
    #[error("Code {code} outside range [0, {cardinality}) for column {column}")]
    InvalidCode {
        column: String,
        code: i64,
        cardinality: usize,
    },

    /// Serving-time schema disagrees with the trained schema
    #[error("Feature schema mismatch: {0}")]
    SchemaMismatch(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for CoreError {
    fn from(err: bincode::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

/// Result type for triage core operations
pub type Result<T> = std::result::Result<T, CoreError>;
