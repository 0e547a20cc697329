//! One-time artifact loading at startup
//!
//! Builds the predictor the service holds for its whole lifetime. Any
//! failure here leaves the process up but degraded; there is no retry.

use crate::config::ServiceConfig;
use anyhow::{Context, Result};
use std::sync::Arc;
use triage_core::{
    ArtifactSet, FeatureSchema, NormalizationRules, Predictor, SchemaColumn,
};

/// Load the artifact set, verify any schema override, and assemble the
/// predictor.
pub fn load_predictor(config: &ServiceConfig) -> Result<Predictor> {
    let artifacts = ArtifactSet::load(&config.artifact_dir).with_context(|| {
        format!(
            "Failed to load artifact set from {}",
            config.artifact_dir.display()
        )
    })?;

    if let Some(path) = &config.schema_override {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema override {}", path.display()))?;
        let names: Vec<String> =
            serde_json::from_str(&raw).context("Schema override is not a JSON array of names")?;

        let served = FeatureSchema::new(
            names
                .iter()
                .map(|name| {
                    artifacts
                        .schema
                        .column(name)
                        .cloned()
                        .unwrap_or_else(|| SchemaColumn::categorical(name.clone()))
                })
                .collect(),
        );

        artifacts
            .schema
            .ensure_compatible(&served)
            .context("Schema override is incompatible with the trained schema")?;
        tracing::info!(columns = names.len(), "schema override accepted");
    }

    let rules = match &config.rules_path {
        Some(path) => NormalizationRules::load(path).with_context(|| {
            format!("Failed to load normalization rules {}", path.display())
        })?,
        None => NormalizationRules::survey_defaults(),
    };

    Ok(Predictor::new(Arc::new(artifacts), rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use triage_core::{ForestModel, ModelMetadata, Node, Tree, Vocabulary};

    fn sample_artifacts() -> ArtifactSet {
        let leaf = |class, n_classes| ForestModel {
            trees: vec![Tree {
                nodes: vec![Node {
                    feature_index: 0,
                    threshold: 0,
                    left: 0,
                    right: 0,
                    class: Some(class),
                }],
            }],
            n_classes,
            feature_count: 2,
            metadata: ModelMetadata::default(),
        };

        let mut vocabularies = BTreeMap::new();
        vocabularies.insert(
            "family_history".to_string(),
            Vocabulary::fit("family_history", vec![Some("Yes"), Some("No")]),
        );

        ArtifactSet {
            schema: FeatureSchema::new(vec![
                SchemaColumn::numeric("Age"),
                SchemaColumn::categorical("family_history").optional_with_default(0),
            ]),
            vocabularies,
            condition_model: leaf(0, 2),
            condition_labels: Vocabulary::fit("condition", vec![Some("Anxiety"), Some("Stress")]),
            treatment_model: leaf(1, 2),
            treatment_labels: Vocabulary::fit("treatment", vec![Some("No"), Some("Yes")]),
        }
    }

    #[test]
    fn test_load_predictor_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        sample_artifacts().save(dir.path()).unwrap();

        let config = ServiceConfig {
            artifact_dir: dir.path().to_path_buf(),
            ..ServiceConfig::default()
        };

        let predictor = load_predictor(&config).unwrap();
        assert_eq!(predictor.artifacts().schema.len(), 2);
    }

    #[test]
    fn test_missing_artifacts_fail() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            artifact_dir: dir.path().join("nope"),
            ..ServiceConfig::default()
        };
        assert!(load_predictor(&config).is_err());
    }

    #[test]
    fn test_schema_override_may_skip_optional_column() {
        let dir = tempfile::tempdir().unwrap();
        sample_artifacts().save(dir.path()).unwrap();

        let override_path = dir.path().join("override.json");
        std::fs::write(&override_path, r#"["Age"]"#).unwrap();

        let config = ServiceConfig {
            artifact_dir: dir.path().to_path_buf(),
            schema_override: Some(override_path),
            ..ServiceConfig::default()
        };
        assert!(load_predictor(&config).is_ok());
    }

    #[test]
    fn test_schema_override_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        sample_artifacts().save(dir.path()).unwrap();

        let override_path = dir.path().join("override.json");
        std::fs::write(&override_path, r#"["family_history", "Age"]"#).unwrap();

        let config = ServiceConfig {
            artifact_dir: dir.path().to_path_buf(),
            schema_override: Some(override_path),
            ..ServiceConfig::default()
        };
        assert!(load_predictor(&config).is_err());
    }
}
