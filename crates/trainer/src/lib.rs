//! Deterministic offline trainer for survey triage models
//!
//! Fits vocabulary encoders and forest classifiers from a labeled survey
//! CSV, producing one atomic artifact set plus an evaluation report.
//! Identical data, config, and seed always yield identical artifacts.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod pipeline;
pub mod report;
pub mod semi;
pub mod trainer;

pub use cart::{CartBuilder, TreeConfig};
pub use dataset::{read_records_csv, SurveyDataset};
pub use pipeline::{run, PipelineConfig, SemiSupervisedConfig, TrainingOutput};
pub use report::{evaluate, ClassReport, EvaluationReport};
pub use semi::{mask_labels, SelfTrainingConfig, SelfTrainingTrainer};
pub use trainer::{ForestConfig, ForestTrainer};
