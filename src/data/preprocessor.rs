// ============================================================
// Layer 4 — Feature Preprocessor
// ============================================================
// Turns StudentRecords into fixed-width numeric FeatureVectors.
//
// Two distinct operations:
//   fit(training records)  → FittedPreprocessor   (offline only)
//   transform(record)      → FeatureVector         (training AND serving)
//
// The fitted parameters (EncodingTable + ScalingParameters) are
// produced once, persisted inside the training artifact and then
// reused verbatim. The serving path never calls fit.
//
// Transform steps, in order:
//   1. Impute   total_clicks missing         → 0
//               avg_assessment_score missing → fit-time mean (persisted)
//   2. Encode   gender, region, highest_education, age_band
//               → index of the category in the sorted fit-time classes
//               unknown category → UnknownCategory error
//   3. Scale    total_clicks, avg_assessment_score,
//               studied_credits, num_of_prev_attempts
//               → (x - mean) / std, or 0 when std == 0
//
// Output column order is FEATURE_NAMES and never changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;
use crate::domain::record::{Outcome, StudentRecord};

/// Model input column order. Shared by training, serving and explanations.
pub const FEATURE_NAMES: [&str; 8] = [
    "gender",
    "region",
    "highest_education",
    "age_band",
    "num_of_prev_attempts",
    "studied_credits",
    "total_clicks",
    "avg_assessment_score",
];

pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// A fully preprocessed row, in FEATURE_NAMES order.
pub type FeatureVector = Vec<f64>;

// ─── Columns ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalColumn {
    Gender,
    Region,
    HighestEducation,
    AgeBand,
}

impl CategoricalColumn {
    pub const ALL: [CategoricalColumn; 4] = [
        CategoricalColumn::Gender,
        CategoricalColumn::Region,
        CategoricalColumn::HighestEducation,
        CategoricalColumn::AgeBand,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CategoricalColumn::Gender           => "gender",
            CategoricalColumn::Region           => "region",
            CategoricalColumn::HighestEducation => "highest_education",
            CategoricalColumn::AgeBand          => "age_band",
        }
    }

    fn value(self, r: &StudentRecord) -> &str {
        match self {
            CategoricalColumn::Gender           => &r.gender,
            CategoricalColumn::Region           => &r.region,
            CategoricalColumn::HighestEducation => &r.highest_education,
            CategoricalColumn::AgeBand          => &r.age_band,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericColumn {
    NumOfPrevAttempts,
    StudiedCredits,
    TotalClicks,
    AvgAssessmentScore,
}

impl NumericColumn {
    pub const ALL: [NumericColumn; 4] = [
        NumericColumn::NumOfPrevAttempts,
        NumericColumn::StudiedCredits,
        NumericColumn::TotalClicks,
        NumericColumn::AvgAssessmentScore,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NumericColumn::NumOfPrevAttempts  => "num_of_prev_attempts",
            NumericColumn::StudiedCredits     => "studied_credits",
            NumericColumn::TotalClicks        => "total_clicks",
            NumericColumn::AvgAssessmentScore => "avg_assessment_score",
        }
    }
}

// ─── EncodingTable ────────────────────────────────────────────────────────────
/// The sorted list of categories seen for one column at fit time.
/// A category's code is its index in this list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCodes {
    classes: Vec<String>,
}

impl CategoryCodes {
    fn fit<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let mut classes: Vec<String> = values.map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn code(&self, value: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(value)).ok()
    }

    pub fn class(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// Fitted category → code assignments for every categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingTable {
    columns: BTreeMap<CategoricalColumn, CategoryCodes>,
}

impl EncodingTable {
    pub fn encode(&self, column: CategoricalColumn, value: &str) -> Result<usize, PipelineError> {
        self.columns
            .get(&column)
            .and_then(|codes| codes.code(value))
            .ok_or_else(|| PipelineError::UnknownCategory {
                column: column.name().to_string(),
                value:  value.to_string(),
            })
    }

    pub fn decode(&self, column: CategoricalColumn, code: usize) -> Option<&str> {
        self.columns.get(&column).and_then(|codes| codes.class(code))
    }

    pub fn codes(&self, column: CategoricalColumn) -> Option<&CategoryCodes> {
        self.columns.get(&column)
    }
}

// ─── ScalingParameters ────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub mean: f64,
    /// Population standard deviation (ddof = 0)
    pub std: f64,
}

impl ColumnScale {
    fn fit(values: &[f64]) -> Self {
        let n    = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var  = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self { mean, std: var.sqrt() }
    }

    pub fn apply(&self, x: f64) -> f64 {
        if self.std == 0.0 { 0.0 } else { (x - self.mean) / self.std }
    }
}

/// Fitted per-column (mean, std) plus the persisted score fill value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingParameters {
    columns: BTreeMap<NumericColumn, ColumnScale>,

    /// Mean of the observed avg_assessment_score values in the fitting set
    pub score_fill: f64,
}

impl ScalingParameters {
    pub fn scale(&self, column: NumericColumn) -> Option<ColumnScale> {
        self.columns.get(&column).copied()
    }
}

// ─── Preprocessor ─────────────────────────────────────────────────────────────
/// The fit step. Stateless; everything it learns goes into FittedPreprocessor.
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Learn encodings and scaling from a training set.
    pub fn fit(&self, records: &[StudentRecord]) -> Result<FittedPreprocessor, PipelineError> {
        let encoding = self.fit_encoding(records)?;
        self.fit_with_encoding(records, encoding)
    }

    /// Collect the category vocabulary of every categorical column.
    /// Carries no statistics, so it may see rows the scaler must not.
    pub fn fit_encoding(&self, records: &[StudentRecord]) -> Result<EncodingTable, PipelineError> {
        check_not_empty(records)?;
        let columns = CategoricalColumn::ALL
            .iter()
            .map(|&col| (col, CategoryCodes::fit(records.iter().map(|r| col.value(r)))))
            .collect();
        Ok(EncodingTable { columns })
    }

    /// Learn scaling and the score fill from `records`, keeping a given encoding.
    pub fn fit_with_encoding(
        &self,
        records:  &[StudentRecord],
        encoding: EncodingTable,
    ) -> Result<FittedPreprocessor, PipelineError> {
        check_not_empty(records)?;

        // ── Score fill value: mean of OBSERVED scores only ────────────────────
        let observed: Vec<f64> = records.iter().filter_map(|r| r.avg_assessment_score).collect();
        let score_fill = if observed.is_empty() {
            0.0
        } else {
            observed.iter().sum::<f64>() / observed.len() as f64
        };

        // ── Scaling: statistics over the imputed fitting set ──────────────────
        let columns = NumericColumn::ALL
            .iter()
            .map(|&col| {
                let values: Vec<f64> = records
                    .iter()
                    .map(|r| imputed_value(col, r, score_fill))
                    .collect();
                (col, ColumnScale::fit(&values))
            })
            .collect();
        let scaling = ScalingParameters { columns, score_fill };

        tracing::debug!(
            "Fitted preprocessor on {} rows (score fill = {:.4})",
            records.len(),
            score_fill
        );

        Ok(FittedPreprocessor { encoding, scaling })
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn check_not_empty(records: &[StudentRecord]) -> Result<(), PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::InvalidData(
            "cannot fit the preprocessor on an empty table".into(),
        ));
    }
    Ok(())
}

/// Raw numeric value after the missing-value policy, before scaling.
fn imputed_value(col: NumericColumn, r: &StudentRecord, score_fill: f64) -> f64 {
    match col {
        NumericColumn::NumOfPrevAttempts  => r.num_of_prev_attempts as f64,
        NumericColumn::StudiedCredits     => r.studied_credits as f64,
        NumericColumn::TotalClicks        => r.total_clicks.unwrap_or(0.0),
        NumericColumn::AvgAssessmentScore => r.avg_assessment_score.unwrap_or(score_fill),
    }
}

/// The fitted, read-only transformation shared by training and serving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    pub encoding: EncodingTable,
    pub scaling:  ScalingParameters,
}

impl FittedPreprocessor {
    /// Transform one record into a FeatureVector (FEATURE_NAMES order).
    pub fn transform(&self, r: &StudentRecord) -> Result<FeatureVector, PipelineError> {
        let mut row = Vec::with_capacity(N_FEATURES);

        for col in CategoricalColumn::ALL {
            row.push(self.encoding.encode(col, col.value(r))? as f64);
        }

        for col in NumericColumn::ALL {
            let scale = self.scaling.scale(col).ok_or_else(|| {
                PipelineError::ArtifactLoad(format!("no scaling parameters for '{}'", col.name()))
            })?;
            row.push(scale.apply(imputed_value(col, r, self.scaling.score_fill)));
        }

        Ok(row)
    }

    /// Transform a batch, failing on the first bad record.
    pub fn transform_all(&self, records: &[StudentRecord]) -> Result<Vec<FeatureVector>, PipelineError> {
        records.iter().map(|r| self.transform(r)).collect()
    }

    /// Binary targets for a labelled set. Every record needs a final_result.
    pub fn labels(&self, records: &[StudentRecord]) -> Result<Vec<u8>, PipelineError> {
        records
            .iter()
            .map(|r| {
                r.final_result
                    .as_deref()
                    .map(|raw| Outcome::from_raw(raw).label())
                    .ok_or_else(|| {
                        PipelineError::InvalidData("record without final_result in training set".into())
                    })
            })
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        gender: &str,
        region: &str,
        edu:    &str,
        age:    &str,
        attempts: u32,
        credits:  u32,
        clicks: Option<f64>,
        score:  Option<f64>,
        result: &str,
    ) -> StudentRecord {
        StudentRecord {
            gender:               gender.into(),
            region:               region.into(),
            highest_education:    edu.into(),
            age_band:             age.into(),
            num_of_prev_attempts: attempts,
            studied_credits:      credits,
            total_clicks:         clicks,
            avg_assessment_score: score,
            final_result:         Some(result.into()),
        }
    }

    fn training_set() -> Vec<StudentRecord> {
        vec![
            record("M", "North", "A Level", "0-35", 0, 60, Some(100.0), Some(80.0), "Pass"),
            record("F", "South", "HE Qualification", "35-55", 1, 120, None, None, "Fail"),
            record("F", "East", "Lower Than A Level", "55+", 0, 30, Some(400.0), Some(40.0), "Withdrawn"),
            record("M", "West", "A Level", "0-35", 2, 60, Some(250.0), Some(60.0), "Distinction"),
        ]
    }

    fn column(rows: &[FeatureVector], name: &str) -> Vec<f64> {
        let idx = FEATURE_NAMES.iter().position(|n| *n == name).unwrap();
        rows.iter().map(|r| r[idx]).collect()
    }

    #[test]
    fn test_fit_rejects_empty() {
        assert!(matches!(Preprocessor::new().fit(&[]), Err(PipelineError::InvalidData(_))));
    }

    #[test]
    fn test_vocabulary_can_come_from_a_wider_set() {
        let all   = training_set();
        let train = &all[..2];

        let encoding = Preprocessor::new().fit_encoding(&all).unwrap();
        let fitted   = Preprocessor::new().fit_with_encoding(train, encoding).unwrap();
        let narrow   = Preprocessor::new().fit(train).unwrap();

        // "55+" only occurs outside the scaling rows and still encodes
        assert!(fitted.transform(&all[2]).is_ok());
        assert!(matches!(narrow.transform(&all[2]), Err(PipelineError::UnknownCategory { .. })));
        assert_eq!(fitted.scaling, narrow.scaling);
    }

    #[test]
    fn test_label_binarization() {
        let data   = training_set();
        let fitted = Preprocessor::new().fit(&data).unwrap();
        assert_eq!(fitted.labels(&data).unwrap(), vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let data   = training_set();
        let fitted = Preprocessor::new().fit(&data).unwrap();

        for col in CategoricalColumn::ALL {
            for r in &data {
                let value = col.value(r);
                let code  = fitted.encoding.encode(col, value).unwrap();
                assert_eq!(fitted.encoding.decode(col, code), Some(value));
            }
        }
    }

    #[test]
    fn test_codes_follow_sorted_classes() {
        let fitted = Preprocessor::new().fit(&training_set()).unwrap();
        // East < North < South < West
        assert_eq!(fitted.encoding.encode(CategoricalColumn::Region, "East").unwrap(), 0);
        assert_eq!(fitted.encoding.encode(CategoricalColumn::Region, "West").unwrap(), 3);
        assert_eq!(fitted.encoding.encode(CategoricalColumn::Gender, "F").unwrap(), 0);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let fitted = Preprocessor::new().fit(&training_set()).unwrap();
        let mut r  = training_set()[0].clone();
        r.region   = "Antarctica".into();

        assert_eq!(
            fitted.transform(&r),
            Err(PipelineError::UnknownCategory {
                column: "region".into(),
                value:  "Antarctica".into(),
            })
        );
    }

    #[test]
    fn test_scaled_fitting_set_is_standardised() {
        let data   = training_set();
        let fitted = Preprocessor::new().fit(&data).unwrap();
        let rows   = fitted.transform_all(&data).unwrap();

        for col in NumericColumn::ALL {
            let values = column(&rows, col.name());
            let n      = values.len() as f64;
            let mean   = values.iter().sum::<f64>() / n;
            let std    = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            assert!(mean.abs() < 1e-9, "{} mean = {}", col.name(), mean);
            assert!((std - 1.0).abs() < 1e-9, "{} std = {}", col.name(), std);
        }
    }

    #[test]
    fn test_missing_clicks_become_zero_before_scaling() {
        let data   = training_set();
        let fitted = Preprocessor::new().fit(&data).unwrap();
        let scale  = fitted.scaling.scale(NumericColumn::TotalClicks).unwrap();

        let row = fitted.transform(&data[1]).unwrap();
        let idx = FEATURE_NAMES.iter().position(|n| *n == "total_clicks").unwrap();
        assert!((row[idx] - scale.apply(0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_missing_score_uses_persisted_fit_mean() {
        let data   = training_set();
        let fitted = Preprocessor::new().fit(&data).unwrap();

        // Mean of the three observed scores, not of the inference batch
        assert!((fitted.scaling.score_fill - 60.0).abs() < 1e-12);

        let scale = fitted.scaling.scale(NumericColumn::AvgAssessmentScore).unwrap();
        let mut r = data[0].clone();
        r.avg_assessment_score = None;
        let row = fitted.transform(&r).unwrap();
        let idx = FEATURE_NAMES.iter().position(|n| *n == "avg_assessment_score").unwrap();
        assert!((row[idx] - scale.apply(60.0)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_std_scales_to_zero() {
        let mut data = training_set();
        for r in &mut data {
            r.num_of_prev_attempts = 3;
        }
        let fitted = Preprocessor::new().fit(&data).unwrap();
        let rows   = fitted.transform_all(&data).unwrap();
        assert!(column(&rows, "num_of_prev_attempts").iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let data   = training_set();
        let fitted = Preprocessor::new().fit(&data).unwrap();
        let first  = fitted.transform_all(&data).unwrap();
        let second = fitted.transform_all(&data).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|r| r.len() == N_FEATURES));
    }

    #[test]
    fn test_parameters_survive_serialisation() {
        let fitted = Preprocessor::new().fit(&training_set()).unwrap();
        let json   = serde_json::to_string(&fitted).unwrap();
        let back: FittedPreprocessor = serde_json::from_str(&json).unwrap();
        assert_eq!(fitted, back);
    }

    #[test]
    fn test_missing_label_is_invalid() {
        let mut data = training_set();
        data[2].final_result = None;
        let fitted = Preprocessor::new().fit(&data).unwrap();
        assert!(matches!(fitted.labels(&data), Err(PipelineError::InvalidData(_))));
    }
}
