// ============================================================
// Layer 5 — Random Forest
// ============================================================
// Tree-ensemble variant A: bagged regression trees on 0/1 targets
// with per-split feature subsampling.
//
//   margin(x) = mean over trees of the leaf Pass-probability
//
// A row is classified as Pass when the margin exceeds 0.5.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::dataset::validate_training_data;
use crate::domain::error::PipelineError;
use crate::ml::predictor::{check_input, ModelStructure, Predictor, TreeEnsembleView};
use crate::ml::tree::{DecisionTree, TreeConfig};

/// Random forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees:           usize,
    /// Maximum depth of each tree
    pub max_depth:         usize,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf:  usize,
    /// Max features per split (sqrt of total if None)
    pub max_features:      Option<usize>,
    /// Bootstrap sampling
    pub bootstrap:         bool,
    pub seed:              u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees:           100,
            max_depth:         10,
            min_samples_split: 5,
            min_samples_leaf:  2,
            max_features:      None,
            bootstrap:         true,
            seed:              42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config:     ForestConfig,
    trees:      Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self { config, trees: Vec::new(), n_features: 0 }
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl Predictor for RandomForest {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn train(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), PipelineError> {
        validate_training_data(features, labels)?;
        if self.config.n_trees == 0 {
            return Err(PipelineError::InvalidData("a forest needs at least one tree".into()));
        }

        let n_samples  = features.len();
        let n_features = features[0].len();
        let targets: Vec<f64> = labels.iter().map(|&l| l as f64).collect();

        // Classification default: sqrt(n_features) candidates per split
        let max_features = self
            .config
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize);

        let tree_config = TreeConfig {
            max_depth:         self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf:  self.config.min_samples_leaf,
            max_features:      Some(max_features),
        };

        // Build trees in parallel; each tree owns a seed so the result
        // does not depend on thread scheduling
        let config = &self.config;
        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let indices: Vec<usize> = if config.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                DecisionTree::fit(features, &targets, None, &indices, &tree_config, &mut rng)
            })
            .collect();

        let mean_depth =
            trees.iter().map(DecisionTree::depth).sum::<usize>() as f64 / trees.len() as f64;
        let n_leaves: usize = trees.iter().map(DecisionTree::n_leaves).sum();
        tracing::debug!(
            "Random forest: {} trees, mean depth {:.1}, {} leaves, {} features per split",
            trees.len(),
            mean_depth,
            n_leaves,
            max_features
        );

        self.trees      = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict_margin(&self, features: &[f64]) -> Result<f64, PipelineError> {
        check_input(self.n_features, features)?;
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    fn decision_threshold(&self) -> f64 {
        0.5
    }

    fn structure(&self) -> ModelStructure<'_> {
        ModelStructure::TreeEnsemble(TreeEnsembleView {
            trees: &self.trees,
            scale: 1.0 / self.trees.len().max(1) as f64,
            bias:  0.0,
        })
    }
}
