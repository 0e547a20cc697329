//! Integer-only random-forest evaluator
//!
//! Deterministic, reproducible evaluation of majority-vote tree ensembles.
//! No floating point is used anywhere on the serving path.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    /// Feature index to compare (for internal nodes)
    pub feature_index: u16,
    /// Threshold value for comparison
    pub threshold: i64,
    /// Index of left child node
    pub left: u16,
    /// Index of right child node
    pub right: u16,
    /// Leaf class (None for internal nodes, Some for leaves)
    pub class: Option<u32>,
}

/// A single decision tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tree {
    /// Nodes in depth-first order
    pub nodes: Vec<Node>,
}

/// Training-run metadata carried with a model
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Trainer version string
    pub version: String,
    /// Unix timestamp of the training run
    pub created_at: i64,
    /// Number of training samples the model saw
    pub sample_count: usize,
}

/// Majority-vote forest classifier bound to one feature schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForestModel {
    pub trees: Vec<Tree>,
    /// Label cardinality; predictions are in [0, n_classes)
    pub n_classes: u32,
    /// Expected feature vector length
    pub feature_count: usize,
    pub metadata: ModelMetadata,
}

/// Walk a single tree to its leaf class.
///
/// Structural damage (dangling child index, feature index out of bounds)
/// resolves to class 0 instead of panicking.
fn eval_tree(tree: &Tree, features: &[i64]) -> u32 {
    let mut idx = 0usize;

    loop {
        if idx >= tree.nodes.len() {
            return 0;
        }

        let node = &tree.nodes[idx];

        if let Some(class) = node.class {
            return class;
        }

        let feature_idx = node.feature_index as usize;
        if feature_idx >= features.len() {
            return 0;
        }

        idx = if features[feature_idx] <= node.threshold {
            node.left as usize
        } else {
            node.right as usize
        };
    }
}

impl ForestModel {
    /// Per-class vote counts over all trees.
    pub fn votes(&self, features: &[i64]) -> Vec<u32> {
        let mut votes = vec![0u32; self.n_classes.max(1) as usize];

        for tree in &self.trees {
            let class = eval_tree(tree, features) as usize;
            if class < votes.len() {
                votes[class] += 1;
            }
        }

        votes
    }

    /// Predict a label id by majority vote over all trees.
    ///
    /// Vote ties resolve to the smallest label id so that prediction is a
    /// pure function of the feature vector.
    pub fn predict(&self, features: &[i64]) -> u32 {
        let votes = self.votes(features);

        let mut best = 0usize;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[best] {
                best = class;
            }
        }
        best as u32
    }

    /// Validate the model structure against its declared shape.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("model has no trees".to_string());
        }
        if self.n_classes == 0 {
            return Err("model has no classes".to_string());
        }
        if self.feature_count == 0 {
            return Err("model has no features".to_string());
        }

        for (tree_idx, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(format!("tree {tree_idx} has no nodes"));
            }

            for (node_idx, node) in tree.nodes.iter().enumerate() {
                match node.class {
                    Some(class) => {
                        if class >= self.n_classes {
                            return Err(format!(
                                "leaf {node_idx} in tree {tree_idx} has class {class} outside [0, {})",
                                self.n_classes
                            ));
                        }
                    }
                    None => {
                        if node.left as usize >= tree.nodes.len()
                            || node.right as usize >= tree.nodes.len()
                        {
                            return Err(format!(
                                "node {node_idx} in tree {tree_idx} has a dangling child"
                            ));
                        }
                        if node.feature_index as usize >= self.feature_count {
                            return Err(format!(
                                "node {node_idx} in tree {tree_idx} reads feature {} outside [0, {})",
                                node.feature_index, self.feature_count
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
