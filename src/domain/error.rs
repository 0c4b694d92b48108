// ============================================================
// Layer 3 — Pipeline Error Taxonomy
// ============================================================
// Every failure the preprocessing → prediction → explanation
// pipeline can report. Per-request variants are turned into a
// structured error response at the request boundary; an
// ArtifactLoad error is fatal at startup.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Missing/extra request fields or values of the wrong type
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A categorical value that the fitted encoding table has never seen
    #[error("unknown category '{value}' for column '{column}'")]
    UnknownCategory { column: String, value: String },

    /// Feature count inconsistent with what the model was trained on
    #[error("dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Corrupt or version-incompatible training artifact
    #[error("cannot load training artifact: {0}")]
    ArtifactLoad(String),

    /// Training or fitting data that cannot produce a model
    #[error("invalid training data: {0}")]
    InvalidData(String),

    #[error("model has not been trained")]
    NotTrained,
}

impl PipelineError {
    /// Stable machine-readable name used in error responses
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MalformedInput(_)        => "MalformedInput",
            PipelineError::UnknownCategory { .. }   => "UnknownCategory",
            PipelineError::DimensionMismatch { .. } => "DimensionMismatch",
            PipelineError::ArtifactLoad(_)          => "ArtifactLoad",
            PipelineError::InvalidData(_)           => "InvalidData",
            PipelineError::NotTrained               => "NotTrained",
        }
    }

    /// Shorthand used by every component that checks row width
    pub fn check_dimension(expected: usize, actual: usize) -> Result<(), PipelineError> {
        if expected == actual {
            Ok(())
        } else {
            Err(PipelineError::DimensionMismatch { expected, actual })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimension() {
        assert!(PipelineError::check_dimension(8, 8).is_ok());
        assert_eq!(
            PipelineError::check_dimension(8, 7),
            Err(PipelineError::DimensionMismatch { expected: 8, actual: 7 })
        );
    }

    #[test]
    fn test_unknown_category_message() {
        let e = PipelineError::UnknownCategory {
            column: "region".into(),
            value:  "Antarctica".into(),
        };
        assert_eq!(e.kind(), "UnknownCategory");
        assert!(e.to_string().contains("Antarctica"));
    }
}
