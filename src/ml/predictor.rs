// ============================================================
// Layer 5 — Predictor Interface
// ============================================================
// The capability set every classifier offers:
//
//   train(features, labels)
//   predict_margin(row) → raw decision score
//   predict(row)        → 0 / 1 (margin compared to a threshold)
//   structure()         → TreeEnsemble { trees, scale, bias } | Other
//
// `structure()` is the explicit tag the Explainer dispatches on:
// tree ensembles get exact TreeSHAP, everything else gets the
// sampling explainer. Nothing inspects concrete types at runtime.
//
// `Model` is the closed, serialisable set of implementations that
// ends up inside the training artifact.

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;
use crate::ml::boosting::{BoostingConfig, GradientBoosting};
use crate::ml::forest::{ForestConfig, RandomForest};
use crate::ml::network::{NetConfig, NeuralNet};
use crate::ml::tree::DecisionTree;

pub trait Predictor: Send + Sync {
    /// Short identifier used in logs and metrics
    fn name(&self) -> &'static str;

    /// Width of the rows the model was trained on (0 before training)
    fn n_features(&self) -> usize;

    fn train(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), PipelineError>;

    /// Decision score before thresholding
    fn predict_margin(&self, features: &[f64]) -> Result<f64, PipelineError>;

    /// Margins above this value are classified as 1
    fn decision_threshold(&self) -> f64;

    fn predict(&self, features: &[f64]) -> Result<u8, PipelineError> {
        let margin = self.predict_margin(features)?;
        Ok(u8::from(margin > self.decision_threshold()))
    }

    fn structure(&self) -> ModelStructure<'_>;
}

/// What the Explainer is allowed to know about a predictor.
#[derive(Debug, Clone, Copy)]
pub enum ModelStructure<'a> {
    TreeEnsemble(TreeEnsembleView<'a>),
    Other,
}

/// margin(x) = bias + scale × Σ tree.predict(x)
#[derive(Debug, Clone, Copy)]
pub struct TreeEnsembleView<'a> {
    pub trees: &'a [DecisionTree],
    pub scale: f64,
    pub bias: f64,
}

/// Fail with NotTrained / DimensionMismatch before touching model internals.
pub(crate) fn check_input(expected: usize, row: &[f64]) -> Result<(), PipelineError> {
    if expected == 0 {
        return Err(PipelineError::NotTrained);
    }
    PipelineError::check_dimension(expected, row.len())
}

// ─── Model ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
    NeuralNet,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::NeuralNet => "neural_net",
        }
    }
}

/// Hyperparameters for every model kind; only the selected one is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelParams {
    pub forest: ForestConfig,
    pub boosting: BoostingConfig,
    pub network: NetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum Model {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    NeuralNet(NeuralNet),
}

impl Model {
    /// An untrained model of the requested kind
    pub fn new(kind: ModelKind, params: &ModelParams) -> Self {
        match kind {
            ModelKind::RandomForest => Model::RandomForest(RandomForest::new(params.forest.clone())),
            ModelKind::GradientBoosting => {
                Model::GradientBoosting(GradientBoosting::new(params.boosting.clone()))
            }
            ModelKind::NeuralNet => Model::NeuralNet(NeuralNet::new(params.network.clone())),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Model::RandomForest(_) => ModelKind::RandomForest,
            Model::GradientBoosting(_) => ModelKind::GradientBoosting,
            Model::NeuralNet(_) => ModelKind::NeuralNet,
        }
    }

    fn inner(&self) -> &dyn Predictor {
        match self {
            Model::RandomForest(m) => m,
            Model::GradientBoosting(m) => m,
            Model::NeuralNet(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Predictor {
        match self {
            Model::RandomForest(m) => m,
            Model::GradientBoosting(m) => m,
            Model::NeuralNet(m) => m,
        }
    }
}

impl Predictor for Model {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn train(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), PipelineError> {
        self.inner_mut().train(features, labels)
    }

    fn predict_margin(&self, features: &[f64]) -> Result<f64, PipelineError> {
        self.inner().predict_margin(features)
    }

    fn decision_threshold(&self) -> f64 {
        self.inner().decision_threshold()
    }

    fn structure(&self) -> ModelStructure<'_> {
        self.inner().structure()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::test_support::separable_data;

    fn small_params() -> ModelParams {
        let mut p = ModelParams::default();
        p.forest.n_trees = 10;
        p.boosting.n_estimators = 20;
        p.network.epochs = 200;
        p
    }

    #[test]
    fn test_every_kind_is_interchangeable() {
        let (x, y) = separable_data(80, 3);
        for kind in [ModelKind::RandomForest, ModelKind::GradientBoosting, ModelKind::NeuralNet] {
            let mut model = Model::new(kind, &small_params());
            model.train(&x, &y).unwrap();

            assert_eq!(model.kind(), kind);
            assert_eq!(model.n_features(), 3);
            let correct = x
                .iter()
                .zip(&y)
                .filter(|(row, &label)| model.predict(row).unwrap() == label)
                .count();
            assert!(correct as f64 / x.len() as f64 > 0.9, "{} underfits", model.name());
        }
    }

    #[test]
    fn test_untrained_model_refuses_to_predict() {
        let model = Model::new(ModelKind::RandomForest, &small_params());
        assert_eq!(model.predict(&[0.0, 0.0, 0.0]), Err(PipelineError::NotTrained));
    }

    #[test]
    fn test_wrong_width_is_dimension_mismatch() {
        let (x, y) = separable_data(40, 3);
        let mut model = Model::new(ModelKind::GradientBoosting, &small_params());
        model.train(&x, &y).unwrap();
        assert_eq!(
            model.predict_margin(&[0.0, 1.0]),
            Err(PipelineError::DimensionMismatch { expected: 3, actual: 2 })
        );
    }

    #[test]
    fn test_structure_tags() {
        let (x, y) = separable_data(40, 2);
        let mut forest = Model::new(ModelKind::RandomForest, &small_params());
        let mut net = Model::new(ModelKind::NeuralNet, &small_params());
        forest.train(&x, &y).unwrap();
        net.train(&x, &y).unwrap();

        assert!(matches!(forest.structure(), ModelStructure::TreeEnsemble(v) if v.trees.len() == 10));
        assert!(matches!(net.structure(), ModelStructure::Other));
    }

    #[test]
    fn test_model_survives_serialisation() {
        let (x, y) = separable_data(40, 3);
        for kind in [ModelKind::RandomForest, ModelKind::GradientBoosting, ModelKind::NeuralNet] {
            let mut model = Model::new(kind, &small_params());
            model.train(&x, &y).unwrap();

            let json = serde_json::to_string(&model).unwrap();
            let back: Model = serde_json::from_str(&json).unwrap();
            for row in &x {
                let a = model.predict_margin(row).unwrap();
                let b = back.predict_margin(row).unwrap();
                assert!((a - b).abs() < 1e-12);
            }
        }
    }
}
