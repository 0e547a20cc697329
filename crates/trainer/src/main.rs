//! Survey triage trainer CLI
//!
//! Deterministic offline trainer producing reproducible artifact sets,
//! plus a batch-prediction mode over unlabeled CSVs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use triage_core::{ArtifactSet, NormalizationRules, Predictor};
use triage_trainer::{
    ForestConfig, PipelineConfig, SemiSupervisedConfig, SurveyDataset,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "triage-train")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic trainer for survey triage models", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train both classifiers from a labeled CSV and emit an artifact set
    Train(TrainArgs),
    /// Predict both targets for every row of an unlabeled CSV
    Batch(BatchArgs),
}

#[derive(clap::Args, Debug)]
struct TrainArgs {
    /// Labeled CSV dataset (header row, two target columns)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the artifact set and report
    #[arg(short, long, default_value = "models")]
    output: PathBuf,

    /// Normalization rules TOML; defaults to the built-in survey rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Condition target column name
    #[arg(long, default_value = "condition")]
    condition_column: String,

    /// Treatment target column name
    #[arg(long, default_value = "treatment")]
    treatment_column: String,

    /// Number of trees per forest
    #[arg(long, default_value = "100")]
    trees: usize,

    /// Maximum tree depth
    #[arg(long, default_value = "8")]
    max_depth: usize,

    /// Minimum samples per leaf
    #[arg(long, default_value = "2")]
    min_samples_leaf: usize,

    /// Held-out evaluation fraction in percent
    #[arg(long, default_value = "20")]
    test_percent: u32,

    /// Seed for shuffling, sampling, and label masking
    #[arg(long, default_value = "42")]
    seed: i64,

    /// Skip dataset shuffling
    #[arg(long)]
    no_shuffle: bool,

    /// Train the condition classifier semi-supervised
    #[arg(long)]
    semi_supervised: bool,

    /// Fraction of condition labels to withhold, in millionths
    #[arg(long, default_value = "500000")]
    mask_fraction: i64,

    /// Pseudo-labels promoted per self-training round
    #[arg(long, default_value = "10")]
    k_best: usize,

    /// Maximum self-training rounds
    #[arg(long, default_value = "10")]
    max_iter: usize,

    /// Columns a serving-time schema override may omit
    #[arg(long)]
    optional_column: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct BatchArgs {
    /// Unlabeled CSV of survey responses
    #[arg(short, long)]
    input: PathBuf,

    /// Directory holding a trained artifact set
    #[arg(short, long, default_value = "models")]
    artifacts: PathBuf,

    /// Output CSV with prediction columns appended
    #[arg(short, long, default_value = "predictions.csv")]
    output: PathBuf,

    /// Normalization rules TOML; defaults to the built-in survey rules
    #[arg(long)]
    rules: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match args.command {
        Command::Train(train_args) => train(train_args),
        Command::Batch(batch_args) => batch(batch_args),
    }
}

fn load_rules(path: &Option<PathBuf>) -> Result<NormalizationRules> {
    match path {
        Some(path) => NormalizationRules::load(path)
            .with_context(|| format!("Failed to load rules from {}", path.display())),
        None => Ok(NormalizationRules::survey_defaults()),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    info!("Survey triage trainer v{}", env!("CARGO_PKG_VERSION"));
    info!("═══════════════════════════════════════════");

    info!("Loading dataset from: {}", args.input.display());
    let dataset = SurveyDataset::from_csv(
        &args.input,
        &args.condition_column,
        &args.treatment_column,
    )
    .context("Failed to load dataset")?;

    info!(
        "Loaded {} samples with {} feature columns",
        dataset.len(),
        dataset.feature_columns.len()
    );

    let rules = load_rules(&args.rules)?;

    let forest = ForestConfig {
        num_trees: args.trees,
        max_depth: args.max_depth,
        min_samples_leaf: args.min_samples_leaf,
        seed: args.seed,
    };

    let config = PipelineConfig {
        condition_column: args.condition_column.clone(),
        treatment_column: args.treatment_column.clone(),
        test_percent: args.test_percent,
        shuffle_seed: (!args.no_shuffle).then_some(args.seed),
        condition_forest: forest.clone(),
        treatment_forest: ForestConfig {
            seed: args.seed + 1,
            ..forest
        },
        semi_supervised: args.semi_supervised.then(|| SemiSupervisedConfig {
            mask_fraction_micro: args.mask_fraction,
            k_best: args.k_best,
            max_iter: args.max_iter,
        }),
        optional_columns: args.optional_column.clone(),
    };

    info!("Training configuration:");
    info!("  Trees: {}", args.trees);
    info!("  Max depth: {}", args.max_depth);
    info!("  Min samples per leaf: {}", args.min_samples_leaf);
    info!("  Test fraction: {}%", args.test_percent);
    info!("  Seed: {}", args.seed);
    info!("  Semi-supervised condition target: {}", args.semi_supervised);

    info!("═══════════════════════════════════════════");
    info!("Starting training...");
    let output = triage_trainer::run(dataset, &rules, &config)?;

    info!("Training complete!");
    for report in [&output.condition_report, &output.treatment_report] {
        for line in report.to_string().lines() {
            info!("{line}");
        }
    }

    output
        .artifacts
        .save(&args.output)
        .context("Failed to save artifact set")?;

    let report_path = args.output.join("report.json");
    let report_json = serde_json::to_vec_pretty(&serde_json::json!({
        "condition": output.condition_report,
        "treatment": output.treatment_report,
    }))?;
    std::fs::write(&report_path, report_json)
        .context("Failed to write evaluation report")?;

    info!("═══════════════════════════════════════════");
    info!("✓ Training completed successfully");
    info!("  Artifacts: {}", args.output.display());
    info!("  Report: {}", report_path.display());

    Ok(())
}

fn batch(args: BatchArgs) -> Result<()> {
    info!("Loading artifact set from: {}", args.artifacts.display());
    let artifacts = ArtifactSet::load(&args.artifacts)?;
    let rules = load_rules(&args.rules)?;
    let predictor = Predictor::new(std::sync::Arc::new(artifacts), rules);

    info!("Loading responses from: {}", args.input.display());
    let (columns, records) = triage_trainer::read_records_csv(&args.input)?;
    info!("Predicting {} rows...", records.len());

    let predictions = predictor.predict_batch(&records)?;

    let mut out = String::new();
    out.push_str(&columns.join(","));
    out.push_str(",Predicted_Condition,Treatment_Needed\n");

    for (record, prediction) in records.iter().zip(&predictions) {
        let mut cells: Vec<String> = columns
            .iter()
            .map(|column| csv_cell(record.get(column).unwrap_or("")))
            .collect();
        cells.push(csv_cell(&prediction.condition));
        cells.push(csv_cell(&prediction.treatment));
        out.push_str(&cells.join(","));
        out.push('\n');
    }

    std::fs::write(&args.output, out)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!("✓ Predictions written to {}", args.output.display());
    Ok(())
}

fn csv_cell(value: &str) -> String {
    if value.contains(',') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}
