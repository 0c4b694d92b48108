// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records how well each training run did on its held-out test
// split, plus which features drove the model's decisions.
//
// Output files (inside the artifact directory):
//
//   metrics.csv — one row appended per training run
//     model,n_train,n_test,accuracy,precision,recall,f1
//     gradient_boosting,26074,6519,0.871000,0.889000,0.912000,0.900000
//
//   feature_importance.csv — rewritten per run
//     feature,mean_abs_attribution
//     avg_assessment_score,0.913000
//     ...
//
// Precision / recall / F1 treat Pass (label 1) as the positive
// class. A ratio with an empty denominator is reported as 0.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

pub const METRICS_FILE: &str = "metrics.csv";
pub const IMPORTANCE_FILE: &str = "feature_importance.csv";

/// Test-set evaluation of one trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub model:   String,
    pub n_train: usize,
    pub n_test:  usize,

    /// Fraction of test rows classified correctly
    pub accuracy: f64,

    /// TP / (TP + FP)
    pub precision: f64,

    /// TP / (TP + FN)
    pub recall: f64,

    /// Harmonic mean of precision and recall
    pub f1: f64,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl EvaluationMetrics {
    /// Compare predictions against ground truth.
    pub fn from_predictions(
        model:     impl Into<String>,
        n_train:   usize,
        predicted: &[u8],
        actual:    &[u8],
    ) -> Self {
        let mut tp = 0;
        let mut fp = 0;
        let mut fn_ = 0;
        let mut correct = 0;
        for (&p, &a) in predicted.iter().zip(actual) {
            match (p, a) {
                (1, 1) => tp += 1,
                (1, _) => fp += 1,
                (_, 1) => fn_ += 1,
                _ => {}
            }
            if p == a {
                correct += 1;
            }
        }

        let precision = ratio(tp, tp + fp);
        let recall    = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            model: model.into(),
            n_train,
            n_test: predicted.len(),
            accuracy: ratio(correct, predicted.len()),
            precision,
            recall,
            f1,
        }
    }
}

#[derive(Debug, Serialize)]
struct ImportanceRow<'a> {
    feature:              &'a str,
    mean_abs_attribution: f64,
}

/// Writes evaluation and importance CSVs into one directory.
pub struct MetricsLogger {
    dir:      PathBuf,
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the metrics.csv header if the file doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join(METRICS_FILE);

        // Appending across runs keeps a history of every model trained here
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "model,n_train,n_test,accuracy,precision,recall,f1")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { dir, csv_path })
    }

    /// Append one run's evaluation as a new row.
    pub fn log(&self, m: &EvaluationMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{},{:.6},{:.6},{:.6},{:.6}",
            m.model, m.n_train, m.n_test, m.accuracy, m.precision, m.recall, m.f1,
        )?;

        tracing::debug!("Logged {} metrics: accuracy={:.4}, f1={:.4}", m.model, m.accuracy, m.f1);
        Ok(())
    }

    /// Rewrite feature_importance.csv, most important feature first.
    pub fn write_importance(&self, names: &[&str], importance: &[f64]) -> Result<()> {
        let path = self.dir.join(IMPORTANCE_FILE);
        let mut rows: Vec<ImportanceRow<'_>> = names
            .iter()
            .zip(importance)
            .map(|(&feature, &mean_abs_attribution)| ImportanceRow { feature, mean_abs_attribution })
            .collect();
        rows.sort_by(|a, b| b.mean_abs_attribution.total_cmp(&a.mean_abs_attribution));

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        tracing::debug!("Wrote feature importance for {} features", rows.len());
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_counts() {
        // TP=2, FP=1, FN=1, TN=1
        let m = EvaluationMetrics::from_predictions("rf", 10, &[1, 1, 1, 0, 0], &[1, 1, 0, 1, 0]);
        assert_eq!(m.n_test, 5);
        assert!((m.accuracy - 0.6).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions() {
        let m = EvaluationMetrics::from_predictions("nn", 4, &[0, 0], &[1, 0]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert_eq!(m.accuracy, 0.5);
    }

    #[test]
    fn test_log_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        let m = EvaluationMetrics::from_predictions("rf", 3, &[1, 0], &[1, 0]);
        logger.log(&m).unwrap();
        logger.log(&m).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "model,n_train,n_test,accuracy,precision,recall,f1");
        assert!(lines[1].starts_with("rf,3,2,1.000000"));

        // A second logger on the same directory keeps the history
        MetricsLogger::new(dir.path()).unwrap().log(&m).unwrap();
        assert_eq!(fs::read_to_string(logger.csv_path()).unwrap().lines().count(), 4);
    }

    #[test]
    fn test_importance_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.write_importance(&["a", "b", "c"], &[0.1, 0.5, 0.3]).unwrap();

        let text = fs::read_to_string(dir.path().join(IMPORTANCE_FILE)).unwrap();
        let features: Vec<&str> = text.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(features, vec!["b", "c", "a"]);
        assert!(text.starts_with("feature,mean_abs_attribution"));
    }
}
