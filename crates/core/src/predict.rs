//! Prediction over an immutable artifact set
//!
//! The predictor owns nothing mutable: it borrows one shared `ArtifactSet`
//! and a rule table, so any number of concurrent calls can run against it
//! without locking.

use crate::artifacts::ArtifactSet;
use crate::assemble::assemble;
use crate::errors::Result;
use crate::normalize::NormalizationRules;
use crate::record::Record;
use std::sync::Arc;

/// Both target labels for one survey response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub condition: String,
    pub treatment: String,
}

/// Stateless inference over one loaded artifact set.
#[derive(Debug, Clone)]
pub struct Predictor {
    artifacts: Arc<ArtifactSet>,
    rules: NormalizationRules,
}

impl Predictor {
    pub fn new(artifacts: Arc<ArtifactSet>, rules: NormalizationRules) -> Self {
        Self { artifacts, rules }
    }

    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Predict both targets for one raw record.
    ///
    /// Normalization and assembly never fail; a decode failure means a
    /// classifier produced a code outside its own label vocabulary, which
    /// signals artifact corruption and propagates.
    pub fn predict(&self, record: &Record) -> Result<Prediction> {
        let mut record = record.clone();
        self.rules.apply(&mut record);

        let features = assemble(&record, &self.artifacts.schema, &self.artifacts.vocabularies);

        let condition_code = self.artifacts.condition_model.predict(&features);
        let condition = self
            .artifacts
            .condition_labels
            .decode(condition_code as i64)?
            .to_string();

        let treatment_code = self.artifacts.treatment_model.predict(&features);
        let treatment = self
            .artifacts
            .treatment_labels
            .decode(treatment_code as i64)?
            .to_string();

        tracing::debug!(%condition, %treatment, "prediction complete");
        Ok(Prediction {
            condition,
            treatment,
        })
    }

    /// Predict a whole batch, failing on the first structural error.
    pub fn predict_batch(&self, records: &[Record]) -> Result<Vec<Prediction>> {
        records.iter().map(|record| self.predict(record)).collect()
    }
}
