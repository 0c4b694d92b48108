// ============================================================
// Layer 4 — OULAD Loader
// ============================================================
// Reads the four raw OULAD-style CSV tables and merges them into
// one row per student registration.
//
//   studentInfo.csv        id_student, gender, region, ... final_result
//   studentVle.csv         id_student, sum_click           (one row per click event)
//   assessments.csv        id_assessment, weight           (weight is a percentage)
//   studentAssessment.csv  id_assessment, id_student, score
//
// Aggregates per student:
//   total_clicks         = Σ sum_click
//   avg_assessment_score = mean( score × weight / 100 )
//
// Merge policy: LEFT join on id_student, in studentInfo order.
// Students without activity keep `None` aggregates — imputation
// is the Preprocessor's responsibility, not ours.
//
// A missing file or unparseable row is fatal. Nothing is retried.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::File,
    path::{Path, PathBuf},
};

use crate::domain::record::{MergedStudent, StudentRecord};
use crate::domain::traits::StudentSource;

/// File names of the four source tables inside the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderPaths {
    pub student_info:       String,
    pub clickstream:        String,
    pub assessments:        String,
    pub student_assessment: String,
}

impl Default for LoaderPaths {
    fn default() -> Self {
        Self {
            student_info:       "studentInfo.csv".to_string(),
            clickstream:        "studentVle.csv".to_string(),
            assessments:        "assessments.csv".to_string(),
            student_assessment: "studentAssessment.csv".to_string(),
        }
    }
}

// ─── Raw CSV rows ─────────────────────────────────────────────────────────────
// Only the columns we use are declared. csv + serde match by header
// name and ignore the rest (code_module, imd_band, disability, ...).

#[derive(Debug, Deserialize)]
struct StudentInfoRow {
    id_student:           u64,
    gender:               String,
    region:               String,
    highest_education:    String,
    age_band:             String,
    num_of_prev_attempts: u32,
    studied_credits:      u32,
    final_result:         String,
}

#[derive(Debug, Deserialize)]
struct ClickRow {
    id_student: u64,
    sum_click:  f64,
}

#[derive(Debug, Deserialize)]
struct AssessmentRow {
    id_assessment: u64,
    weight:        f64,
}

#[derive(Debug, Deserialize)]
struct StudentAssessmentRow {
    id_assessment: u64,
    id_student:    u64,
    /// Empty cells (unsubmitted work) deserialize to None
    score: Option<f64>,
}

/// Loads and merges the raw tables found in one directory.
pub struct OuladLoader {
    dir:   PathBuf,
    paths: LoaderPaths,
}

impl OuladLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_paths(dir, LoaderPaths::default())
    }

    pub fn with_paths(dir: impl Into<PathBuf>, paths: LoaderPaths) -> Self {
        Self { dir: dir.into(), paths }
    }
}

impl StudentSource for OuladLoader {
    fn load_all(&self) -> Result<Vec<MergedStudent>> {
        let info: Vec<StudentInfoRow> = read_table(&self.dir.join(&self.paths.student_info))?;
        let clicks: Vec<ClickRow>     = read_table(&self.dir.join(&self.paths.clickstream))?;
        let assessments: Vec<AssessmentRow> =
            read_table(&self.dir.join(&self.paths.assessments))?;
        let submissions: Vec<StudentAssessmentRow> =
            read_table(&self.dir.join(&self.paths.student_assessment))?;

        tracing::info!(
            "Read {} student rows, {} click rows, {} assessments, {} submissions",
            info.len(),
            clicks.len(),
            assessments.len(),
            submissions.len()
        );

        let click_totals = aggregate_clicks(&clicks);
        let avg_scores   = aggregate_scores(&assessments, &submissions);

        let merged: Vec<MergedStudent> = info
            .into_iter()
            .map(|row| MergedStudent {
                id_student: row.id_student,
                record: StudentRecord {
                    total_clicks:         click_totals.get(&row.id_student).copied(),
                    avg_assessment_score: avg_scores.get(&row.id_student).copied(),
                    gender:               row.gender,
                    region:               row.region,
                    highest_education:    row.highest_education,
                    age_band:             row.age_band,
                    num_of_prev_attempts: row.num_of_prev_attempts,
                    studied_credits:      row.studied_credits,
                    final_result:         Some(row.final_result),
                },
            })
            .collect();

        let without_clicks = merged.iter().filter(|m| m.record.total_clicks.is_none()).count();
        let without_scores = merged
            .iter()
            .filter(|m| m.record.avg_assessment_score.is_none())
            .count();
        tracing::debug!(
            "Merged {} rows ({} without clicks, {} without scores)",
            merged.len(),
            without_clicks,
            without_scores
        );

        Ok(merged)
    }
}

/// Deserialize every row of a CSV file, failing on the first bad row.
fn read_table<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open source table '{}'", path.display()))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for (i, result) in reader.deserialize().enumerate() {
        // +2: one for the header line, one for 1-based numbering
        let row: T = result
            .with_context(|| format!("Malformed row {} in '{}'", i + 2, path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// total_clicks per student = sum of all of that student's click counts
fn aggregate_clicks(clicks: &[ClickRow]) -> HashMap<u64, f64> {
    let mut totals: HashMap<u64, f64> = HashMap::new();
    for c in clicks {
        *totals.entry(c.id_student).or_insert(0.0) += c.sum_click;
    }
    totals
}

/// avg_assessment_score per student = mean of score × weight / 100
/// over the student's scored submissions. Submissions for unknown
/// assessments are dropped; unscored submissions are skipped.
fn aggregate_scores(
    assessments: &[AssessmentRow],
    submissions: &[StudentAssessmentRow],
) -> HashMap<u64, f64> {
    let weights: HashMap<u64, f64> = assessments
        .iter()
        .map(|a| (a.id_assessment, a.weight))
        .collect();

    // (sum of weighted scores, count)
    let mut acc: HashMap<u64, (f64, usize)> = HashMap::new();
    for s in submissions {
        let (Some(score), Some(weight)) = (s.score, weights.get(&s.id_assessment)) else {
            continue;
        };
        let entry = acc.entry(s.id_student).or_insert((0.0, 0));
        entry.0 += score * weight / 100.0;
        entry.1 += 1;
    }

    acc.into_iter()
        .map(|(id, (sum, n))| (id, sum / n as f64))
        .collect()
}
