// ============================================================
// Layer 5 — Gradient Boosting
// ============================================================
// Tree-ensemble variant B, log-loss boosting. Every round fits a
// regression tree to the residuals `y - p` and stores the Newton
// step Σ(y - p) / Σ p(1 - p) in each leaf. The margin is the log-odds
//
//   margin(x) = base_score + learning_rate × Σ tree(x)
//
// and a row is classified as Pass when the margin is positive.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::data::dataset::validate_training_data;
use crate::domain::error::PipelineError;
use crate::ml::predictor::{check_input, ModelStructure, Predictor, TreeEnsembleView};
use crate::ml::tree::{DecisionTree, TreeConfig};

/// Boosting hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators:      usize,
    /// Shrinkage applied to every tree
    pub learning_rate:     f64,
    pub max_depth:         usize,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    /// Fraction of rows drawn (without replacement) per round
    pub subsample:         f64,
    pub seed:              u64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators:      100,
            learning_rate:     0.1,
            max_depth:         3,
            min_samples_split: 2,
            min_samples_leaf:  1,
            subsample:         1.0,
            seed:              42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    config:     BoostingConfig,
    base_score: f64,
    trees:      Vec<DecisionTree>,
    n_features: usize,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl GradientBoosting {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            base_score: 0.0,
            trees:      Vec::new(),
            n_features: 0,
        }
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Log-odds of the training prior
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    fn log_loss(margins: &[f64], labels: &[u8]) -> f64 {
        let eps = 1e-15;
        let total: f64 = margins
            .iter()
            .zip(labels)
            .map(|(&m, &y)| {
                let p = sigmoid(m).clamp(eps, 1.0 - eps);
                if y == 1 {
                    -p.ln()
                } else {
                    -(1.0 - p).ln()
                }
            })
            .sum();
        total / margins.len() as f64
    }
}

impl Predictor for GradientBoosting {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn train(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), PipelineError> {
        validate_training_data(features, labels)?;
        let cfg = self.config.clone();
        if !(cfg.subsample > 0.0 && cfg.subsample <= 1.0) {
            return Err(PipelineError::InvalidData(format!(
                "subsample must be in (0, 1], got {}",
                cfg.subsample
            )));
        }

        let n = features.len();
        let y: Vec<f64> = labels.iter().map(|&l| l as f64).collect();

        // ── Initial prediction: log-odds of the positive rate ─────────────────
        let prior      = (y.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();
        let mut margins = vec![base_score; n];

        let tree_config = TreeConfig {
            max_depth:         cfg.max_depth,
            min_samples_split: cfg.min_samples_split,
            min_samples_leaf:  cfg.min_samples_leaf,
            max_features:      None,
        };
        let sample_size = ((n as f64) * cfg.subsample).round().max(1.0) as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let mut all_rows: Vec<usize> = (0..n).collect();
        let mut trees = Vec::with_capacity(cfg.n_estimators);

        for round in 0..cfg.n_estimators {
            // Gradient and hessian of the log-loss at the current margins
            let probs:     Vec<f64> = margins.iter().map(|&m| sigmoid(m)).collect();
            let residuals: Vec<f64> = y.iter().zip(&probs).map(|(yi, p)| yi - p).collect();
            let hessians:  Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();

            let rows: &[usize] = if sample_size < n {
                all_rows.shuffle(&mut rng);
                &all_rows[..sample_size]
            } else {
                &all_rows
            };

            let tree = DecisionTree::fit(
                features,
                &residuals,
                Some(&hessians),
                rows,
                &tree_config,
                &mut rng,
            );

            for (m, row) in margins.iter_mut().zip(features) {
                *m += cfg.learning_rate * tree.predict(row);
            }
            trees.push(tree);

            if (round + 1) % 25 == 0 {
                tracing::debug!(
                    "Boosting round {:>4}: train log-loss {:.5}",
                    round + 1,
                    Self::log_loss(&margins, labels)
                );
            }
        }

        self.base_score = base_score;
        self.trees      = trees;
        self.n_features = features[0].len();
        Ok(())
    }

    fn predict_margin(&self, features: &[f64]) -> Result<f64, PipelineError> {
        check_input(self.n_features, features)?;
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        Ok(self.base_score + self.config.learning_rate * sum)
    }

    fn decision_threshold(&self) -> f64 {
        0.0
    }

    fn structure(&self) -> ModelStructure<'_> {
        ModelStructure::TreeEnsemble(TreeEnsembleView {
            trees: &self.trees,
            scale: self.config.learning_rate,
            bias:  self.base_score,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::test_support::separable_data;

    fn small() -> BoostingConfig {
        BoostingConfig { n_estimators: 30, ..Default::default() }
    }

    #[test]
    fn test_boosting_reduces_loss() {
        let (x, y) = separable_data(120, 3);
        let mut gb = GradientBoosting::new(small());
        gb.train(&x, &y).unwrap();

        let margins: Vec<f64> = x.iter().map(|r| gb.predict_margin(r).unwrap()).collect();
        let prior_only = vec![gb.base_score(); x.len()];
        assert!(
            GradientBoosting::log_loss(&margins, &y) < GradientBoosting::log_loss(&prior_only, &y)
        );
    }

    #[test]
    fn test_margin_is_log_odds() {
        let (x, y) = separable_data(80, 2);
        let mut gb = GradientBoosting::new(small());
        gb.train(&x, &y).unwrap();

        // Mean predicted probability stays close to the training prior
        let mean_p = x.iter().map(|r| sigmoid(gb.predict_margin(r).unwrap())).sum::<f64>() / x.len() as f64;
        let prior  = y.iter().filter(|&&l| l == 1).count() as f64 / y.len() as f64;
        assert!((mean_p - prior).abs() < 0.1, "{mean_p} vs {prior}");

        let m = gb.predict_margin(&x[0]).unwrap();
        assert_eq!(gb.predict(&x[0]).unwrap(), u8::from(m > 0.0));
    }

    #[test]
    fn test_subsampling_is_seeded() {
        let (x, y) = separable_data(80, 3);
        let cfg = BoostingConfig { subsample: 0.5, ..small() };
        let mut a = GradientBoosting::new(cfg.clone());
        let mut b = GradientBoosting::new(cfg);
        a.train(&x, &y).unwrap();
        b.train(&x, &y).unwrap();
        assert_eq!(a.trees(), b.trees());
    }

    #[test]
    fn test_rejects_bad_subsample() {
        let (x, y) = separable_data(10, 2);
        let mut gb = GradientBoosting::new(BoostingConfig { subsample: 0.0, ..small() });
        assert!(matches!(gb.train(&x, &y), Err(PipelineError::InvalidData(_))));
    }
}
