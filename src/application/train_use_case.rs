// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full offline training pipeline in order:
//
//   Step 1: Load + merge the raw tables      (Layer 4 - data)
//   Step 2: Train / test split               (Layer 4 - data)
//   Step 3: Fit the preprocessor on train    (Layer 4 - data)
//   Step 4: Transform both splits            (Layer 4 - data)
//   Step 5: Train the selected model         (Layer 5 - ml)
//   Step 6: Evaluate on the test split       (Layer 6 - infra)
//   Step 7: Pick the background set and
//           compute global importance        (Layer 5 - ml)
//   Step 8: Save config + artifact           (Layer 6 - infra)
//
// Scaling statistics and the score fill are fitted on the training
// split only, so test rows go through exactly the transformation a
// live request will get. The category vocabulary is collected over
// every loaded student, so a rare category that lands only in the
// test split still encodes.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    dataset::FeatureTable,
    loader::{LoaderPaths, OuladLoader},
    preprocessor::{Preprocessor, FEATURE_NAMES},
    splitter::split_train_test,
};
use crate::domain::record::StudentRecord;
use crate::domain::traits::StudentSource;
use crate::infra::{
    artifact::{ArtifactBundle, ArtifactStore},
    metrics::{EvaluationMetrics, MetricsLogger},
};
use crate::ml::explainer::{mean_abs_attributions, Explainer, ExplainerConfig};
use crate::ml::predictor::{Model, ModelKind, ModelParams, Predictor};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything that decides what a training run produces.
// Serialisable so it can be saved next to the artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:      String,
    pub artifact_dir:  String,
    pub paths:         LoaderPaths,
    pub model:         ModelKind,
    pub params:        ModelParams,
    /// Fraction of students held out for evaluation
    pub test_fraction: f64,
    /// Seed for the train/test shuffle
    pub seed:          u64,
    pub explainer:     ExplainerConfig,
    /// Test rows explained to estimate global feature importance
    pub importance_sample: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:          "data".to_string(),
            artifact_dir:      "artifacts".to_string(),
            paths:             LoaderPaths::default(),
            model:             ModelKind::GradientBoosting,
            params:            ModelParams::default(),
            test_fraction:     0.2,
            seed:              42,
            explainer:         ExplainerConfig::default(),
            importance_sample: 200,
        }
    }
}

/// What a finished training run reports back to the CLI.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub metrics:       EvaluationMetrics,
    /// (feature, mean |attribution|) in column order
    pub importance:    Vec<(String, f64)>,
    pub artifact_path: PathBuf,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline against the CSV tables in `data_dir`.
    pub fn execute(&self) -> Result<TrainReport> {
        let loader = OuladLoader::with_paths(&self.config.data_dir, self.config.paths.clone());
        self.execute_with(&loader)
    }

    /// Run the pipeline against any student source.
    pub fn execute_with(&self, source: &dyn StudentSource) -> Result<TrainReport> {
        let cfg = &self.config;
        if !(cfg.test_fraction > 0.0 && cfg.test_fraction < 1.0) {
            bail!("test fraction must be in (0, 1), got {}", cfg.test_fraction);
        }

        // ── Step 1: Load and merge ────────────────────────────────────────────
        tracing::info!("Loading student tables from '{}'", cfg.data_dir);
        let records: Vec<StudentRecord> = source
            .load_all()
            .context("Failed to load training data")?
            .into_iter()
            .map(|m| m.record)
            .collect();
        tracing::info!("Loaded {} students", records.len());

        let preprocessor = Preprocessor::new();
        let encoding = preprocessor
            .fit_encoding(&records)
            .context("Failed to collect category vocabulary")?;

        // ── Step 2: Train / test split ────────────────────────────────────────
        let (train_records, test_records) = split_train_test(records, 1.0 - cfg.test_fraction, cfg.seed);
        if train_records.is_empty() || test_records.is_empty() {
            bail!(
                "not enough students to split: {} train, {} test",
                train_records.len(),
                test_records.len()
            );
        }

        // ── Step 3: Fit on the training split only ────────────────────────────
        let fitted = preprocessor
            .fit_with_encoding(&train_records, encoding)
            .context("Failed to fit the preprocessor")?;

        // ── Step 4: Transform ─────────────────────────────────────────────────
        let train = FeatureTable::new(
            fitted.transform_all(&train_records)?,
            fitted.labels(&train_records)?,
        )?;
        let test = FeatureTable::new(
            fitted.transform_all(&test_records)?,
            fitted.labels(&test_records)?,
        )?;
        tracing::info!(
            "Split: {} train, {} test ({:.1}% Pass in train)",
            train.n_samples(),
            test.n_samples(),
            100.0 * train.positive_rate()
        );

        // ── Step 5: Train ─────────────────────────────────────────────────────
        let mut model = Model::new(cfg.model, &cfg.params);
        tracing::info!("Training {}", model.name());
        model.train(&train.features, &train.labels)?;

        // ── Step 6: Evaluate ──────────────────────────────────────────────────
        let predicted = test
            .features
            .iter()
            .map(|row| model.predict(row))
            .collect::<Result<Vec<u8>, _>>()?;
        let metrics =
            EvaluationMetrics::from_predictions(model.name(), train.n_samples(), &predicted, &test.labels);
        tracing::info!(
            "Test accuracy {:.4}, precision {:.4}, recall {:.4}, F1 {:.4}",
            metrics.accuracy,
            metrics.precision,
            metrics.recall,
            metrics.f1
        );

        // ── Step 7: Background set + global importance ───────────────────────
        // The training split is already shuffled, so its head is a random sample
        let n_background = cfg.explainer.max_background.min(train.n_samples());
        let background   = train.features[..n_background].to_vec();

        let explainer = Explainer::for_predictor(&model, &background, &cfg.explainer)?;
        let n_explain = cfg.importance_sample.min(test.n_samples());
        let attributions = explainer.explain_batch(&test.features[..n_explain])?;
        let importance: Vec<(String, f64)> = FEATURE_NAMES
            .iter()
            .map(|s| s.to_string())
            .zip(mean_abs_attributions(&attributions))
            .collect();
        tracing::info!(
            "Explained {} test rows with the {} explainer",
            attributions.len(),
            explainer.strategy()
        );

        // ── Step 8: Persist ───────────────────────────────────────────────────
        let store = ArtifactStore::new(&cfg.artifact_dir);
        store.save_config(cfg)?;

        let logger = MetricsLogger::new(&cfg.artifact_dir)?;
        logger.log(&metrics)?;
        let values: Vec<f64> = importance.iter().map(|(_, v)| *v).collect();
        logger.write_importance(&FEATURE_NAMES, &values)?;

        let bundle = ArtifactBundle::new(fitted, model, background, cfg.explainer.clone(), cfg.clone());
        store.save(&bundle)?;

        Ok(TrainReport {
            metrics,
            importance,
            artifact_path: store.artifact_path(),
        })
    }
}
