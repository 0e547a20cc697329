//! Random-forest trainer
//!
//! Bagged ensemble of CART classification trees with deterministic
//! bootstrap sampling and per-node feature subsampling.

use anyhow::Result;
use chrono::Utc;
use triage_core::{ForestModel, ModelMetadata};

use crate::cart::{CartBuilder, TreeConfig};
use crate::deterministic::LcgRng;

/// Per-tree seed stride keeping tree streams disjoint
const TREE_SEED_STRIDE: i64 = 1_000_003;

/// Forest training configuration
#[derive(Clone, Debug)]
pub struct ForestConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: i64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            max_depth: 8,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

/// Random-forest trainer
pub struct ForestTrainer {
    config: ForestConfig,
}

impl ForestTrainer {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    /// Train a majority-vote forest on encoded features and label ids
    pub fn train(
        &self,
        features: &[Vec<i64>],
        labels: &[u32],
        n_classes: u32,
    ) -> Result<ForestModel> {
        if features.is_empty() {
            anyhow::bail!("Cannot train on an empty dataset");
        }
        if features.len() != labels.len() {
            anyhow::bail!(
                "Feature rows ({}) and labels ({}) disagree",
                features.len(),
                labels.len()
            );
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
            anyhow::bail!("Label id {bad} outside [0, {n_classes})");
        }

        let n_samples = features.len();
        let feature_count = features[0].len();
        let features_per_split = isqrt(feature_count).max(1);

        let mut trees = Vec::with_capacity(self.config.num_trees);

        for tree_idx in 0..self.config.num_trees {
            let tree_seed = self
                .config
                .seed
                .wrapping_add(tree_idx as i64 * TREE_SEED_STRIDE);

            // Bootstrap sample: n draws with replacement.
            let mut rng = LcgRng::new(tree_seed);
            let indices: Vec<usize> = (0..n_samples)
                .map(|_| rng.next_range(n_samples as i64) as usize)
                .collect();

            let tree_config = TreeConfig {
                max_depth: self.config.max_depth,
                min_samples_leaf: self.config.min_samples_leaf,
                features_per_split,
                seed: tree_seed,
            };

            let builder = CartBuilder::new(features, labels, n_classes, tree_config);
            trees.push(builder.build(&indices));

            tracing::debug!("Trained tree {}/{}", tree_idx + 1, self.config.num_trees);
        }

        let model = ForestModel {
            trees,
            n_classes,
            feature_count,
            metadata: ModelMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                created_at: Utc::now().timestamp(),
                sample_count: n_samples,
            },
        };

        model.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(model)
    }
}

/// Integer square root (floor)
fn isqrt(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}
