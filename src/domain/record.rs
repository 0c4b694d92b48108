// ============================================================
// Layer 3 — StudentRecord Domain Type
// ============================================================
// One row of the merged student table. The same struct is used
// for rows loaded from the raw CSV sources (training) and for
// rows built from an inference request (serving), so the
// Preprocessor only ever has one input shape to handle.
//
// The two aggregate fields are Option<f64> because a student
// with no clickstream or no scored assessment simply has no
// value yet. Filling the gap is the Preprocessor's job.

use serde::{Deserialize, Serialize};

/// A single student's demographic and behavioural features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub gender:               String,
    pub region:               String,
    pub highest_education:    String,
    pub age_band:             String,
    pub num_of_prev_attempts: u32,
    pub studied_credits:      u32,

    /// Sum of clickstream clicks, `None` if the student has no VLE activity
    pub total_clicks: Option<f64>,

    /// Weighted assessment average in [0, 100], `None` if nothing was scored
    pub avg_assessment_score: Option<f64>,

    /// Raw outcome string ("Pass", "Fail", "Withdrawn", "Distinction").
    /// Absent for inference requests.
    pub final_result: Option<String>,
}

/// A record together with the identifier it was joined on.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedStudent {
    pub id_student: u64,
    pub record:     StudentRecord,
}

// ─── Outcome ──────────────────────────────────────────────────────────────────
/// Binary pass/fail outcome used as the model target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Fail,
    Pass,
}

impl Outcome {
    /// Collapse a raw `final_result` value to the binary target.
    /// Pass and Distinction count as passing, everything else fails.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "Pass" | "Distinction" => Outcome::Pass,
            _ => Outcome::Fail,
        }
    }

    /// Map a predicted class label back to an outcome
    pub fn from_label(label: u8) -> Self {
        if label == 1 { Outcome::Pass } else { Outcome::Fail }
    }

    pub fn label(self) -> u8 {
        match self {
            Outcome::Pass => 1,
            Outcome::Fail => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Pass => "Pass",
            Outcome::Fail => "Fail",
        }
    }
}
