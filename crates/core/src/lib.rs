//! Feature-encoding and inference-consistency core for survey triage
//!
//! Guarantees that a survey response collected at serving time is
//! transformed into the exact numeric representation the classifiers were
//! trained on, even when the response contains values never seen during
//! training, missing fields, or drifted schemas.
//!
//! Modules:
//! - `record`: raw survey records at the transport boundary
//! - `normalize`: per-deployment cleanup rules (synonym groups, numeric defaults)
//! - `vocab`: per-column string-to-code vocabularies with unknown fallback
//! - `schema`: the ordered feature layout shared by training and serving
//! - `assemble`: total record-to-vector assembly
//! - `forest`: integer-only majority-vote forest evaluator
//! - `artifacts`: atomic save/load of one training run's outputs
//! - `predict`: two-target prediction over an immutable artifact set

pub mod artifacts;
pub mod assemble;
pub mod errors;
pub mod forest;
pub mod normalize;
pub mod predict;
pub mod record;
pub mod schema;
pub mod vocab;

pub use artifacts::ArtifactSet;
pub use assemble::{assemble, assemble_matrix, FeatureVector};
pub use errors::{CoreError, Result};
pub use forest::{ForestModel, ModelMetadata, Node, Tree};
pub use normalize::{CanonicalGroup, ColumnRule, NormalizationRules};
pub use predict::{Prediction, Predictor};
pub use record::Record;
pub use schema::{ColumnKind, FeatureSchema, SchemaColumn};
pub use vocab::{normalize_cell, Vocabulary, UNKNOWN};

/// Crate version string for artifact metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
