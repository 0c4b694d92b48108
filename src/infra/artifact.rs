// ============================================================
// Layer 6 — Artifact Store
// ============================================================
// Saves and restores everything the serving path needs, as one
// JSON bundle written once by `train` and read once at startup.
//
// What gets saved:
//   1. artifact.json       — ArtifactBundle:
//                              format_version
//                              feature_names (column order)
//                              fitted preprocessor (EncodingTable +
//                                ScalingParameters + score fill)
//                              trained model
//                              background rows for the sampling explainer
//                              explainer config
//                              train config
//   2. train_config.json   — the same TrainConfig, human-readable
//
// Loading checks `format_version` BEFORE decoding the rest, so an
// artifact from an incompatible build fails with a clear message
// instead of a confusing field error. Any load failure is an
// ArtifactLoad error and is fatal at startup.
//
// File layout:
//   artifacts/
//     artifact.json
//     train_config.json
//     metrics.csv              ← written by MetricsLogger
//     feature_importance.csv   ← written by MetricsLogger

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::data::preprocessor::{
    CategoricalColumn, FittedPreprocessor, NumericColumn, FEATURE_NAMES, N_FEATURES,
};
use crate::domain::error::PipelineError;
use crate::ml::explainer::ExplainerConfig;
use crate::ml::predictor::{Model, Predictor};

/// Bumped whenever the bundle layout changes incompatibly
pub const FORMAT_VERSION: u32 = 1;

pub const ARTIFACT_FILE: &str = "artifact.json";
pub const CONFIG_FILE: &str = "train_config.json";

/// The complete output of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub format_version: u32,
    pub feature_names:  Vec<String>,
    pub preprocessor:   FittedPreprocessor,
    pub model:          Model,
    /// Preprocessed training rows used as the sampling explainer's reference set
    pub background:     Vec<Vec<f64>>,
    pub explainer:      ExplainerConfig,
    pub train_config:   TrainConfig,
}

impl ArtifactBundle {
    pub fn new(
        preprocessor: FittedPreprocessor,
        model:        Model,
        background:   Vec<Vec<f64>>,
        explainer:    ExplainerConfig,
        train_config: TrainConfig,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            feature_names:  FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            preprocessor,
            model,
            background,
            explainer,
            train_config,
        }
    }

    /// Check that the bundle matches the feature layout this build expects.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.feature_names != FEATURE_NAMES {
            return Err(PipelineError::ArtifactLoad(format!(
                "feature layout {:?} does not match {:?}",
                self.feature_names, FEATURE_NAMES
            )));
        }

        if self.model.n_features() != N_FEATURES {
            return Err(PipelineError::ArtifactLoad(format!(
                "model expects {} features, pipeline produces {}",
                self.model.n_features(),
                N_FEATURES
            )));
        }

        if let Some(row) = self.background.iter().find(|r| r.len() != N_FEATURES) {
            return Err(PipelineError::ArtifactLoad(format!(
                "background row has {} features, expected {}",
                row.len(),
                N_FEATURES
            )));
        }

        for col in CategoricalColumn::ALL {
            if self.preprocessor.encoding.codes(col).is_none() {
                return Err(PipelineError::ArtifactLoad(format!(
                    "no encoding for column '{}'",
                    col.name()
                )));
            }
        }
        for col in NumericColumn::ALL {
            if self.preprocessor.scaling.scale(col).is_none() {
                return Err(PipelineError::ArtifactLoad(format!(
                    "no scaling parameters for column '{}'",
                    col.name()
                )));
            }
        }

        Ok(())
    }
}

/// Reads and writes the bundle inside one directory.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.dir.join(ARTIFACT_FILE)
    }

    /// Write artifact.json, creating the directory if needed.
    pub fn save(&self, bundle: &ArtifactBundle) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create artifact directory '{}'", self.dir.display()))?;

        let path = self.artifact_path();
        let json = serde_json::to_string(bundle).context("Failed to serialise training artifact")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write artifact to '{}'", path.display()))?;

        tracing::info!("Saved {} artifact to '{}'", bundle.model.name(), path.display());
        Ok(())
    }

    /// Save the training configuration as pretty JSON next to the artifact.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(CONFIG_FILE);

        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Config in '{}' is not a valid training config", path.display()))
    }

    /// Load and validate artifact.json.
    ///
    /// Steps:
    ///   1. Read the file
    ///   2. Parse it as untyped JSON and check `format_version`
    ///   3. Decode the typed bundle
    ///   4. Validate the feature layout
    pub fn load(&self) -> Result<ArtifactBundle, PipelineError> {
        let path = self.artifact_path();
        let text = fs::read_to_string(&path).map_err(|e| {
            PipelineError::ArtifactLoad(format!(
                "cannot read '{}': {e}. Have you run 'train' first?",
                path.display()
            ))
        })?;

        let raw: Value = serde_json::from_str(&text)
            .map_err(|e| PipelineError::ArtifactLoad(format!("corrupt artifact JSON: {e}")))?;

        let version = raw.get("format_version").and_then(Value::as_u64);
        if version != Some(u64::from(FORMAT_VERSION)) {
            return Err(PipelineError::ArtifactLoad(format!(
                "unsupported artifact format version {}, expected {}",
                version.map_or_else(|| "<missing>".to_string(), |v| v.to_string()),
                FORMAT_VERSION
            )));
        }

        let bundle: ArtifactBundle = serde_json::from_value(raw)
            .map_err(|e| PipelineError::ArtifactLoad(format!("invalid artifact contents: {e}")))?;
        bundle.validate()?;

        tracing::info!(
            "Loaded {} artifact from '{}' ({} background rows)",
            bundle.model.name(),
            path.display(),
            bundle.background.len()
        );
        Ok(bundle)
    }
}
