//! CART classification tree builder
//!
//! Deterministic exact-greedy construction using integer gini gain.
//! Feature subsampling per node is hash-ranked so the same dataset, seed,
//! and config always grow the same tree.

use triage_core::{Node, Tree};

use crate::deterministic::{xxhash64_i64, SplitTieBreaker};

/// Impurity values are expressed in millionths (0 = pure, 1_000_000 = max).
const GINI_SCALE: i64 = 1_000_000;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Candidate features considered per split; 0 means all
    pub features_per_split: usize,
    /// Seed for per-node feature subsampling
    pub seed: i64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_samples_leaf: 2,
            features_per_split: 0,
            seed: 0,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: i64,
    gain: i64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: i64, gain: i64, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold, node_id),
        }
    }
}

/// Build a classification tree using exact-greedy CART
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<i64>],
    labels: &'a [u32],
    n_classes: usize,
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<i64>],
        labels: &'a [u32],
        n_classes: u32,
        config: TreeConfig,
    ) -> Self {
        assert_eq!(features.len(), labels.len());

        let feature_count = features.first().map(Vec::len).unwrap_or(0);

        Self {
            config,
            features,
            labels,
            n_classes: n_classes as usize,
            feature_count,
        }
    }

    /// Build a tree over the given sample indices
    pub fn build(&self, indices: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(indices, 0, &mut nodes, 0);
        Tree { nodes }
    }

    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        node_id: usize,
    ) -> u16 {
        let current_idx = nodes.len() as u16;
        let counts = self.class_counts(indices);
        let leaf_class = majority_class(&counts);

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if is_pure
            || depth >= self.config.max_depth
            || indices.len() < 2 * self.config.min_samples_leaf
        {
            nodes.push(leaf(leaf_class));
            return current_idx;
        }

        let split = match self.find_best_split(indices, node_id) {
            Some(s) => s,
            None => {
                nodes.push(leaf(leaf_class));
                return current_idx;
            }
        };

        let (left_indices, right_indices) =
            self.split_samples(indices, split.feature_idx, split.threshold);

        if left_indices.len() < self.config.min_samples_leaf
            || right_indices.len() < self.config.min_samples_leaf
        {
            nodes.push(leaf(leaf_class));
            return current_idx;
        }

        // Reserve the current slot, then attach children.
        nodes.push(Node {
            feature_index: split.feature_idx as u16,
            threshold: split.threshold,
            left: 0,
            right: 0,
            class: None,
        });

        let left_idx = self.build_node(&left_indices, depth + 1, nodes, node_id * 2 + 1);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes, node_id * 2 + 2);

        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    fn find_best_split(&self, indices: &[usize], node_id: usize) -> Option<SplitCandidate> {
        let parent_counts = self.class_counts(indices);
        let parent_gini = gini_micro(&parent_counts, indices.len());

        let mut best_split: Option<SplitCandidate> = None;

        for feature_idx in self.candidate_features(node_id) {
            for threshold in self.thresholds(indices, feature_idx) {
                let (left, right) = self.split_samples(indices, feature_idx, threshold);

                if left.len() < self.config.min_samples_leaf
                    || right.len() < self.config.min_samples_leaf
                {
                    continue;
                }

                let left_gini = gini_micro(&self.class_counts(&left), left.len());
                let right_gini = gini_micro(&self.class_counts(&right), right.len());

                let weighted = ((left.len() as i128 * left_gini as i128
                    + right.len() as i128 * right_gini as i128)
                    / indices.len() as i128) as i64;
                let gain = parent_gini - weighted;

                if gain <= 0 {
                    continue;
                }

                let candidate = SplitCandidate::new(feature_idx, threshold, gain, node_id);

                best_split = match best_split {
                    None => Some(candidate),
                    Some(current) => {
                        if gain > current.gain
                            || (gain == current.gain
                                && candidate.tie_breaker < current.tie_breaker)
                        {
                            Some(candidate)
                        } else {
                            Some(current)
                        }
                    }
                };
            }
        }

        best_split
    }

    /// Candidate feature indices for one node, hash-ranked per node so the
    /// subsample varies across the tree yet stays reproducible.
    fn candidate_features(&self, node_id: usize) -> Vec<usize> {
        let k = self.config.features_per_split;
        if k == 0 || k >= self.feature_count {
            return (0..self.feature_count).collect();
        }

        let mut ranked: Vec<(i64, usize)> = (0..self.feature_count)
            .map(|feature_idx| {
                let hash = xxhash64_i64(
                    &[feature_idx as i64, node_id as i64],
                    self.config.seed,
                );
                (hash, feature_idx)
            })
            .collect();
        ranked.sort();

        let mut chosen: Vec<usize> = ranked.into_iter().take(k).map(|(_, idx)| idx).collect();
        chosen.sort();
        chosen
    }

    /// Distinct values of one feature over the index set, used directly as
    /// `<=` thresholds. Codes and ages are small integers, so no
    /// quantization step is needed.
    fn thresholds(&self, indices: &[usize], feature_idx: usize) -> Vec<i64> {
        let mut values: Vec<i64> = indices
            .iter()
            .map(|&idx| self.features[idx][feature_idx])
            .collect();
        values.sort_unstable();
        values.dedup();
        // The largest value cannot split anything off.
        values.pop();
        values
    }

    fn split_samples(
        &self,
        indices: &[usize],
        feature_idx: usize,
        threshold: i64,
    ) -> (Vec<usize>, Vec<usize>) {
        let mut left = Vec::new();
        let mut right = Vec::new();

        for &idx in indices {
            if self.features[idx][feature_idx] <= threshold {
                left.push(idx);
            } else {
                right.push(idx);
            }
        }

        (left, right)
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes.max(1)];
        for &idx in indices {
            let class = self.labels[idx] as usize;
            if class < counts.len() {
                counts[class] += 1;
            }
        }
        counts
    }
}

fn leaf(class: u32) -> Node {
    Node {
        feature_index: 0,
        threshold: 0,
        left: 0,
        right: 0,
        class: Some(class),
    }
}

/// Majority class with ties resolved to the smallest class id
fn majority_class(counts: &[usize]) -> u32 {
    let mut best = 0usize;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = class;
        }
    }
    best as u32
}

/// Gini impurity in millionths: GINI_SCALE * (1 - sum((c_i / n)^2))
fn gini_micro(counts: &[usize], total: usize) -> i64 {
    if total == 0 {
        return 0;
    }

    let total = total as i128;
    let sum_sq: i128 = counts.iter().map(|&c| (c as i128) * (c as i128)).sum();
    (GINI_SCALE as i128 - sum_sq * GINI_SCALE as i128 / (total * total)) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(tree: &Tree, features: &[i64]) -> u32 {
        let mut idx = 0usize;
        loop {
            let node = &tree.nodes[idx];
            if let Some(class) = node.class {
                return class;
            }
            idx = if features[node.feature_index as usize] <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }

    fn separable_data() -> (Vec<Vec<i64>>, Vec<u32>) {
        let features = vec![
            vec![20, 0],
            vec![25, 1],
            vec![30, 0],
            vec![50, 1],
            vec![55, 0],
            vec![60, 1],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        (features, labels)
    }

    #[test]
    fn test_learns_separable_boundary() {
        let (features, labels) = separable_data();
        let config = TreeConfig {
            max_depth: 3,
            min_samples_leaf: 1,
            features_per_split: 0,
            seed: 42,
        };

        let builder = CartBuilder::new(&features, &labels, 2, config);
        let indices: Vec<usize> = (0..features.len()).collect();
        let tree = builder.build(&indices);

        for (row, &label) in features.iter().zip(&labels) {
            assert_eq!(eval(&tree, row), label);
        }
    }

    #[test]
    fn test_pure_node_becomes_leaf() {
        let features = vec![vec![10], vec![20], vec![30]];
        let labels = vec![1, 1, 1];

        let builder = CartBuilder::new(&features, &labels, 2, TreeConfig::default());
        let tree = builder.build(&[0, 1, 2]);

        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].class, Some(1));
    }

    #[test]
    fn test_build_is_deterministic() {
        let (features, labels) = separable_data();
        let config = TreeConfig {
            max_depth: 4,
            min_samples_leaf: 1,
            features_per_split: 1,
            seed: 7,
        };

        let builder = CartBuilder::new(&features, &labels, 2, config.clone());
        let indices: Vec<usize> = (0..features.len()).collect();
        let tree1 = builder.build(&indices);

        let builder2 = CartBuilder::new(&features, &labels, 2, config);
        let tree2 = builder2.build(&indices);

        assert_eq!(tree1, tree2);
    }

    #[test]
    fn test_min_samples_leaf_limits_splits() {
        let (features, labels) = separable_data();
        let config = TreeConfig {
            max_depth: 4,
            min_samples_leaf: 10,
            features_per_split: 0,
            seed: 0,
        };

        let builder = CartBuilder::new(&features, &labels, 2, config);
        let tree = builder.build(&[0, 1, 2, 3, 4, 5]);

        assert_eq!(tree.nodes.len(), 1);
        assert!(tree.nodes[0].class.is_some());
    }

    #[test]
    fn test_gini_micro_values() {
        assert_eq!(gini_micro(&[4, 0], 4), 0);
        assert_eq!(gini_micro(&[2, 2], 4), 500_000);
        assert_eq!(gini_micro(&[], 0), 0);
    }

    #[test]
    fn test_candidate_features_subsample() {
        let features = vec![vec![0, 0, 0, 0]; 4];
        let labels = vec![0, 0, 1, 1];
        let config = TreeConfig {
            max_depth: 2,
            min_samples_leaf: 1,
            features_per_split: 2,
            seed: 42,
        };

        let builder = CartBuilder::new(&features, &labels, 2, config);
        let chosen = builder.candidate_features(3);
        assert_eq!(chosen.len(), 2);
        assert_eq!(chosen, builder.candidate_features(3));
    }
}
