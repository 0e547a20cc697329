//! End-to-end training pipeline
//!
//! normalize -> fit vocabularies -> fit target vocabularies -> assemble the
//! training matrix -> split -> fit both classifiers -> evaluate -> emit one
//! artifact set. Encoding here and encoding at serving time go through the
//! same core code, which is what keeps the two sides symmetric.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use triage_core::{
    assemble_matrix, ArtifactSet, FeatureSchema, ForestModel, NormalizationRules, SchemaColumn,
    Vocabulary,
};

use crate::dataset::SurveyDataset;
use crate::report::{evaluate, EvaluationReport};
use crate::semi::{mask_labels, SelfTrainingConfig, SelfTrainingTrainer};
use crate::trainer::{ForestConfig, ForestTrainer};

/// Semi-supervised regime for the condition target
#[derive(Clone, Debug)]
pub struct SemiSupervisedConfig {
    /// Fraction of training labels withheld, in millionths
    pub mask_fraction_micro: i64,
    pub k_best: usize,
    pub max_iter: usize,
}

impl Default for SemiSupervisedConfig {
    fn default() -> Self {
        Self {
            mask_fraction_micro: 500_000,
            k_best: 10,
            max_iter: 10,
        }
    }
}

/// Full pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub condition_column: String,
    pub treatment_column: String,
    /// Held-out fraction for the evaluation report, in percent
    pub test_percent: u32,
    /// Row shuffle seed; None keeps file order
    pub shuffle_seed: Option<i64>,
    pub condition_forest: ForestConfig,
    pub treatment_forest: ForestConfig,
    /// When set, the condition classifier trains semi-supervised
    pub semi_supervised: Option<SemiSupervisedConfig>,
    /// Columns a serving-time schema override may omit
    pub optional_columns: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            condition_column: "condition".to_string(),
            treatment_column: "treatment".to_string(),
            test_percent: 20,
            shuffle_seed: Some(42),
            condition_forest: ForestConfig::default(),
            treatment_forest: ForestConfig::default(),
            semi_supervised: None,
            optional_columns: Vec::new(),
        }
    }
}

/// Everything one pipeline run produces
#[derive(Debug)]
pub struct TrainingOutput {
    pub artifacts: ArtifactSet,
    pub condition_report: EvaluationReport,
    pub treatment_report: EvaluationReport,
}

/// Run the whole pipeline over a labeled dataset.
pub fn run(
    mut dataset: SurveyDataset,
    rules: &NormalizationRules,
    config: &PipelineConfig,
) -> Result<TrainingOutput> {
    if let Some(seed) = config.shuffle_seed {
        dataset.shuffle(seed);
    }

    for record in &mut dataset.records {
        rules.apply(record);
    }

    let schema = build_schema(&dataset, rules, config);
    let vocabularies = fit_vocabularies(&dataset, &schema);

    let condition_labels = fit_target(&config.condition_column, &dataset.conditions);
    let treatment_labels = fit_target(&config.treatment_column, &dataset.treatments);

    let condition_ids = encode_target(&dataset.conditions, &condition_labels)?;
    let treatment_ids = encode_target(&dataset.treatments, &treatment_labels)?;

    let matrix = assemble_matrix(&dataset.records, &schema, &vocabularies);

    let n = matrix.len();
    let test_len = (n * config.test_percent.min(100) as usize) / 100;
    let train_len = n - test_len;
    tracing::info!(
        samples = n,
        train = train_len,
        test = test_len,
        features = schema.len(),
        "training matrix assembled"
    );

    let condition_model = train_condition(
        &matrix[..train_len],
        &condition_ids[..train_len],
        condition_labels.len() as u32,
        config,
    )?;
    let condition_report = hold_out_report(
        &config.condition_column,
        &condition_model,
        &matrix[train_len..],
        &condition_ids[train_len..],
        &condition_labels,
    );

    let treatment_model = ForestTrainer::new(config.treatment_forest.clone()).train(
        &matrix[..train_len],
        &treatment_ids[..train_len],
        treatment_labels.len() as u32,
    )?;
    let treatment_report = hold_out_report(
        &config.treatment_column,
        &treatment_model,
        &matrix[train_len..],
        &treatment_ids[train_len..],
        &treatment_labels,
    );

    let artifacts = ArtifactSet {
        schema,
        vocabularies,
        condition_model,
        condition_labels,
        treatment_model,
        treatment_labels,
    };
    artifacts
        .validate()
        .context("Trained artifact set failed validation")?;

    Ok(TrainingOutput {
        artifacts,
        condition_report,
        treatment_report,
    })
}

/// Feature columns in dataset order; a column is numeric exactly when its
/// normalization rule says so.
fn build_schema(
    dataset: &SurveyDataset,
    rules: &NormalizationRules,
    config: &PipelineConfig,
) -> FeatureSchema {
    let columns = dataset
        .feature_columns
        .iter()
        .map(|name| {
            let rule = rules.rule_for(name);
            let numeric_default = match rule {
                Some(triage_core::ColumnRule::Numeric { default, .. }) => Some(*default),
                _ => None,
            };

            let mut column = match numeric_default {
                Some(_) => SchemaColumn::numeric(name.clone()),
                None => SchemaColumn::categorical(name.clone()),
            };
            if config.optional_columns.iter().any(|c| c == name) {
                column = column.optional_with_default(numeric_default.unwrap_or(0));
            }
            column
        })
        .collect();

    FeatureSchema::new(columns)
}

fn fit_vocabularies(
    dataset: &SurveyDataset,
    schema: &FeatureSchema,
) -> BTreeMap<String, Vocabulary> {
    schema
        .columns()
        .iter()
        .filter(|column| column.kind == triage_core::ColumnKind::Categorical)
        .map(|column| {
            let cells = dataset.records.iter().map(|r| r.get(&column.name));
            (
                column.name.clone(),
                Vocabulary::fit(column.name.clone(), cells),
            )
        })
        .collect()
}

fn fit_target(column: &str, labels: &[String]) -> Vocabulary {
    Vocabulary::fit(column, labels.iter().map(|l| Some(l.as_str())))
}

fn encode_target(labels: &[String], vocabulary: &Vocabulary) -> Result<Vec<u32>> {
    labels
        .iter()
        .map(|label| {
            vocabulary
                .code_of(label.trim())
                .map(|code| code as u32)
                .with_context(|| format!("Label {label:?} missing from its own vocabulary"))
        })
        .collect()
}

fn train_condition(
    features: &[Vec<i64>],
    labels: &[u32],
    n_classes: u32,
    config: &PipelineConfig,
) -> Result<ForestModel> {
    match &config.semi_supervised {
        None => ForestTrainer::new(config.condition_forest.clone()).train(
            features,
            labels,
            n_classes,
        ),
        Some(semi) => {
            let masked = mask_labels(
                labels,
                semi.mask_fraction_micro,
                config.condition_forest.seed,
            );
            let labeled = masked.iter().filter(|l| l.is_some()).count();
            tracing::info!(
                labeled,
                unlabeled = masked.len() - labeled,
                "semi-supervised condition training"
            );

            SelfTrainingTrainer::new(SelfTrainingConfig {
                forest: config.condition_forest.clone(),
                k_best: semi.k_best,
                max_iter: semi.max_iter,
            })
            .train(features, &masked, n_classes)
        }
    }
}

fn hold_out_report(
    target: &str,
    model: &ForestModel,
    test_features: &[Vec<i64>],
    test_labels: &[u32],
    labels: &Vocabulary,
) -> EvaluationReport {
    let predictions: Vec<u32> = test_features.iter().map(|row| model.predict(row)).collect();
    evaluate(target, &predictions, test_labels, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{Predictor, Record};

    fn record(age: &str, gender: &str, history: &str) -> Record {
        let mut r = Record::new();
        r.set("Age", age);
        r.set("Gender", gender);
        r.set("family_history", history);
        r
    }

    fn sample_dataset() -> SurveyDataset {
        let mut records = Vec::new();
        let mut conditions = Vec::new();
        let mut treatments = Vec::new();

        // Younger respondents with history lean Anxiety/Yes, older without
        // history lean Stress/No. Enough rows for a stable split.
        for i in 0..12 {
            records.push(record(&format!("{}", 22 + i), "male", "Yes"));
            conditions.push("Anxiety".to_string());
            treatments.push("Yes".to_string());

            records.push(record(&format!("{}", 55 + i), "Female", "No"));
            conditions.push("Stress".to_string());
            treatments.push("No".to_string());
        }

        SurveyDataset {
            records,
            conditions,
            treatments,
            feature_columns: vec![
                "Age".to_string(),
                "Gender".to_string(),
                "family_history".to_string(),
            ],
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            condition_forest: ForestConfig {
                num_trees: 8,
                max_depth: 4,
                min_samples_leaf: 1,
                seed: 42,
            },
            treatment_forest: ForestConfig {
                num_trees: 8,
                max_depth: 4,
                min_samples_leaf: 1,
                seed: 43,
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_pipeline_produces_valid_artifacts() -> Result<()> {
        let output = run(
            sample_dataset(),
            &NormalizationRules::survey_defaults(),
            &fast_config(),
        )?;

        output.artifacts.validate().unwrap();
        assert_eq!(output.artifacts.schema.len(), 3);
        assert_eq!(output.condition_report.target, "condition");
        assert_eq!(output.treatment_report.target, "treatment");

        // Age got a numeric rule, so it is the one numeric column.
        let age = output.artifacts.schema.column("Age").unwrap();
        assert_eq!(age.kind, triage_core::ColumnKind::Numeric);
        assert!(!output.artifacts.vocabularies.contains_key("Age"));
        assert!(output.artifacts.vocabularies.contains_key("Gender"));

        Ok(())
    }

    #[test]
    fn test_pipeline_is_deterministic() -> Result<()> {
        let rules = NormalizationRules::survey_defaults();
        let config = fast_config();

        let a = run(sample_dataset(), &rules, &config)?;
        let b = run(sample_dataset(), &rules, &config)?;

        assert_eq!(a.artifacts.schema, b.artifacts.schema);
        assert_eq!(a.artifacts.vocabularies, b.artifacts.vocabularies);
        assert_eq!(a.artifacts.condition_model.trees, b.artifacts.condition_model.trees);
        assert_eq!(a.artifacts.treatment_model.trees, b.artifacts.treatment_model.trees);
        assert_eq!(a.condition_report, b.condition_report);
        Ok(())
    }

    #[test]
    fn test_trained_artifacts_serve_predictions() -> Result<()> {
        let rules = NormalizationRules::survey_defaults();
        let output = run(sample_dataset(), &rules, &fast_config())?;

        let predictor = Predictor::new(std::sync::Arc::new(output.artifacts), rules);
        let prediction = predictor.predict(&record("25", "M", "Yes"))?;

        assert!(["Anxiety", "Stress"].contains(&prediction.condition.as_str()));
        assert!(["Yes", "No"].contains(&prediction.treatment.as_str()));
        Ok(())
    }

    #[test]
    fn test_semi_supervised_pipeline_runs() -> Result<()> {
        let mut config = fast_config();
        config.semi_supervised = Some(SemiSupervisedConfig {
            mask_fraction_micro: 400_000,
            k_best: 4,
            max_iter: 5,
        });

        let output = run(
            sample_dataset(),
            &NormalizationRules::survey_defaults(),
            &config,
        )?;
        output.artifacts.validate().unwrap();
        Ok(())
    }

    #[test]
    fn test_optional_columns_marked_in_schema() -> Result<()> {
        let mut config = fast_config();
        config.optional_columns = vec!["family_history".to_string()];

        let output = run(
            sample_dataset(),
            &NormalizationRules::survey_defaults(),
            &config,
        )?;
        let column = output.artifacts.schema.column("family_history").unwrap();
        assert!(column.optional);
        Ok(())
    }

    #[test]
    fn test_gender_vocabulary_is_canonical() -> Result<()> {
        // Raw spellings collapse before vocabularies are fit, so the
        // vocabulary only ever sees canonical values.
        let output = run(
            sample_dataset(),
            &NormalizationRules::survey_defaults(),
            &fast_config(),
        )?;

        let gender = &output.artifacts.vocabularies["Gender"];
        assert!(gender.contains("Male"));
        assert!(gender.contains("Female"));
        assert!(!gender.contains("male"));
        Ok(())
    }
}
