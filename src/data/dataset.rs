// ============================================================
// Layer 4 — Feature Table
// ============================================================
// The preprocessed, labelled matrix handed to Predictor::train,
// plus the shape checks every model runs before fitting.

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

/// A preprocessed, labelled feature matrix ready for model training.
/// Rows are FeatureVectors; labels are 0 (Fail) or 1 (Pass).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureTable {
    pub features: Vec<Vec<f64>>,
    pub labels:   Vec<u8>,
}

impl FeatureTable {
    /// Build a table, checking that it is non-empty and rectangular.
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<u8>) -> Result<Self, PipelineError> {
        validate_training_data(&features, &labels)?;
        Ok(Self { features, labels })
    }

    pub fn n_samples(&self) -> usize { self.features.len() }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&l| l == 1).count() as f64 / self.labels.len() as f64
    }
}

/// Shared validation for every `Predictor::train` implementation.
pub fn validate_training_data(features: &[Vec<f64>], labels: &[u8]) -> Result<(), PipelineError> {
    if features.is_empty() {
        return Err(PipelineError::InvalidData("empty training set".into()));
    }
    if features.len() != labels.len() {
        return Err(PipelineError::InvalidData(format!(
            "{} feature rows but {} labels", features.len(), labels.len()
        )));
    }
    let width = features[0].len();
    if width == 0 {
        return Err(PipelineError::InvalidData("feature rows are empty".into()));
    }
    for row in features {
        PipelineError::check_dimension(width, row.len())?;
        if row.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidData("non-finite feature value".into()));
        }
    }
    if labels.iter().any(|&l| l > 1) {
        return Err(PipelineError::InvalidData("labels must be 0 or 1".into()));
    }
    Ok(())
}
