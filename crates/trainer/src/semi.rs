//! Semi-supervised self-training for the condition classifier
//!
//! A configured fraction of training labels is masked before fitting, then
//! an iterative loop promotes the k most confidently predicted unlabeled
//! rows to pseudo-labels each round. This is a training-time experiment
//! only; the resulting model serves like any other forest.

use anyhow::Result;
use triage_core::ForestModel;

use crate::deterministic::LcgRng;
use crate::trainer::{ForestConfig, ForestTrainer};

/// Self-training configuration
#[derive(Clone, Debug)]
pub struct SelfTrainingConfig {
    pub forest: ForestConfig,
    /// Pseudo-labels promoted per round
    pub k_best: usize,
    /// Maximum self-labeling rounds
    pub max_iter: usize,
}

impl Default for SelfTrainingConfig {
    fn default() -> Self {
        Self {
            forest: ForestConfig::default(),
            k_best: 10,
            max_iter: 10,
        }
    }
}

/// Deterministically withhold a fraction of labels (in millionths).
pub fn mask_labels(labels: &[u32], mask_fraction_micro: i64, seed: i64) -> Vec<Option<u32>> {
    let mut rng = LcgRng::new(seed);
    labels
        .iter()
        .map(|&label| {
            if rng.next_unit_micro() < mask_fraction_micro {
                None
            } else {
                Some(label)
            }
        })
        .collect()
}

/// Iterative self-training wrapper around the forest trainer
pub struct SelfTrainingTrainer {
    config: SelfTrainingConfig,
}

impl SelfTrainingTrainer {
    pub fn new(config: SelfTrainingConfig) -> Self {
        Self { config }
    }

    /// Fit a forest on partially labeled data.
    ///
    /// Each round trains on the currently labeled rows, scores the
    /// unlabeled ones by vote count, and promotes the `k_best` most
    /// confident (confidence ties resolve to the lower row index).
    pub fn train(
        &self,
        features: &[Vec<i64>],
        labels: &[Option<u32>],
        n_classes: u32,
    ) -> Result<ForestModel> {
        if features.len() != labels.len() {
            anyhow::bail!(
                "Feature rows ({}) and labels ({}) disagree",
                features.len(),
                labels.len()
            );
        }

        let mut working: Vec<Option<u32>> = labels.to_vec();
        if working.iter().all(Option::is_none) {
            anyhow::bail!("Self-training needs at least one labeled sample");
        }

        let trainer = ForestTrainer::new(self.config.forest.clone());
        let mut model = self.fit_labeled(&trainer, features, &working, n_classes)?;

        for round in 0..self.config.max_iter {
            let unlabeled: Vec<usize> = (0..working.len())
                .filter(|&i| working[i].is_none())
                .collect();
            if unlabeled.is_empty() {
                break;
            }

            // Score every unlabeled row by its winning vote count.
            let mut scored: Vec<(u32, usize, u32)> = unlabeled
                .iter()
                .map(|&idx| {
                    let votes = model.votes(&features[idx]);
                    let class = model.predict(&features[idx]);
                    (votes[class as usize], idx, class)
                })
                .collect();
            scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

            let promoted = scored.len().min(self.config.k_best);
            if promoted == 0 {
                break;
            }
            for &(_, idx, class) in scored.iter().take(promoted) {
                working[idx] = Some(class);
            }

            tracing::debug!(
                round = round + 1,
                promoted,
                remaining = scored.len() - promoted,
                "self-training round complete"
            );

            model = self.fit_labeled(&trainer, features, &working, n_classes)?;
        }

        Ok(model)
    }

    fn fit_labeled(
        &self,
        trainer: &ForestTrainer,
        features: &[Vec<i64>],
        labels: &[Option<u32>],
        n_classes: u32,
    ) -> Result<ForestModel> {
        let mut subset_features = Vec::new();
        let mut subset_labels = Vec::new();
        for (row, label) in features.iter().zip(labels) {
            if let Some(label) = label {
                subset_features.push(row.clone());
                subset_labels.push(*label);
            }
        }
        trainer.train(&subset_features, &subset_labels, n_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One feature value per class so every informative tree is the same
    /// clean stump and pseudo-labels are always right.
    fn separable_data() -> (Vec<Vec<i64>>, Vec<u32>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..15 {
            features.push(vec![10]);
            labels.push(0);
            features.push(vec![70]);
            labels.push(1);
        }
        (features, labels)
    }

    #[test]
    fn test_mask_labels_fraction() {
        let labels = vec![0u32; 1000];
        let masked = mask_labels(&labels, 500_000, 42);

        let hidden = masked.iter().filter(|l| l.is_none()).count();
        // Half masked, within a loose tolerance.
        assert!((350..=650).contains(&hidden), "hidden = {hidden}");
    }

    #[test]
    fn test_mask_labels_deterministic() {
        let labels = vec![1u32; 100];
        assert_eq!(mask_labels(&labels, 300_000, 9), mask_labels(&labels, 300_000, 9));
        assert_ne!(mask_labels(&labels, 300_000, 9), mask_labels(&labels, 300_000, 10));
    }

    #[test]
    fn test_self_training_recovers_separable_labels() -> Result<()> {
        let (features, labels) = separable_data();
        let masked = mask_labels(&labels, 400_000, 42);
        assert!(masked.iter().any(Option::is_none));
        assert!(masked.iter().any(Option::is_some));

        let config = SelfTrainingConfig {
            forest: ForestConfig {
                num_trees: 8,
                max_depth: 3,
                min_samples_leaf: 1,
                seed: 42,
            },
            k_best: 5,
            max_iter: 10,
        };

        let model = SelfTrainingTrainer::new(config).train(&features, &masked, 2)?;

        for (row, &label) in features.iter().zip(&labels) {
            assert_eq!(model.predict(row), label);
        }
        Ok(())
    }

    #[test]
    fn test_self_training_deterministic() -> Result<()> {
        let (features, labels) = separable_data();
        let masked = mask_labels(&labels, 400_000, 1);

        let config = SelfTrainingConfig {
            forest: ForestConfig {
                num_trees: 4,
                max_depth: 3,
                min_samples_leaf: 1,
                seed: 5,
            },
            k_best: 3,
            max_iter: 5,
        };

        let model1 = SelfTrainingTrainer::new(config.clone()).train(&features, &masked, 2)?;
        let model2 = SelfTrainingTrainer::new(config).train(&features, &masked, 2)?;
        assert_eq!(model1.trees, model2.trees);
        Ok(())
    }

    #[test]
    fn test_fully_masked_fails() {
        let features = vec![vec![1], vec![2]];
        let labels = vec![None, None];
        let result = SelfTrainingTrainer::new(SelfTrainingConfig::default())
            .train(&features, &labels, 2);
        assert!(result.is_err());
    }
}
