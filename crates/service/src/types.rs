//! Wire types for the HTTP surface

use serde::{Deserialize, Serialize};

/// Successful prediction: always both labels or neither
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictResponse {
    pub predicted_condition: String,
    pub treatment_needed: String,
}

/// Health probe payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: u64,
}

/// JSON error body shared by every failure path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub retryable: bool,
}
