// ============================================================
// Layer 3 — Inference Request / Response
// ============================================================
// The wire contract of the serving path.
//
// A request is a JSON object with EXACTLY these keys:
//   gender, region, highest_education, age_band,
//   num_of_prev_attempts, studied_credits,
//   total_clicks, avg_assessment_score
//
// Validation happens here, before anything reaches the
// Preprocessor. Any missing key, extra key or mistyped value is
// a MalformedInput error. The two aggregate fields accept `null`
// to mean "not observed", which the Preprocessor then imputes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::PipelineError;
use crate::domain::record::StudentRecord;

/// The key set every inference request must carry.
pub const REQUEST_KEYS: [&str; 8] = [
    "gender",
    "region",
    "highest_education",
    "age_band",
    "num_of_prev_attempts",
    "studied_credits",
    "total_clicks",
    "avg_assessment_score",
];

/// Parse and validate a request body into a StudentRecord.
pub fn parse_request(body: &Value) -> Result<StudentRecord, PipelineError> {
    let obj = body
        .as_object()
        .ok_or_else(|| PipelineError::MalformedInput("request must be a JSON object".into()))?;

    check_key_set(obj)?;

    Ok(StudentRecord {
        gender:               string_field(obj, "gender")?,
        region:               string_field(obj, "region")?,
        highest_education:    string_field(obj, "highest_education")?,
        age_band:             string_field(obj, "age_band")?,
        num_of_prev_attempts: count_field(obj, "num_of_prev_attempts")?,
        studied_credits:      count_field(obj, "studied_credits")?,
        total_clicks:         optional_number(obj, "total_clicks", None)?,
        avg_assessment_score: optional_number(obj, "avg_assessment_score", Some(100.0))?,
        final_result:         None,
    })
}

/// Reject requests whose key set differs from REQUEST_KEYS in either direction
fn check_key_set(obj: &Map<String, Value>) -> Result<(), PipelineError> {
    let missing: Vec<&str> = REQUEST_KEYS
        .iter()
        .copied()
        .filter(|k| !obj.contains_key(*k))
        .collect();

    let extra: Vec<&str> = obj
        .keys()
        .map(String::as_str)
        .filter(|k| !REQUEST_KEYS.contains(k))
        .collect();

    match (missing.is_empty(), extra.is_empty()) {
        (true, true)  => Ok(()),
        (false, _)    => Err(PipelineError::MalformedInput(format!(
            "missing field(s): {}", missing.join(", ")
        ))),
        (true, false) => Err(PipelineError::MalformedInput(format!(
            "unexpected field(s): {}", extra.join(", ")
        ))),
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Result<String, PipelineError> {
    match &obj[key] {
        Value::String(s) => Ok(s.clone()),
        other => Err(PipelineError::MalformedInput(format!(
            "'{key}' must be a string, got {other}"
        ))),
    }
}

/// Non-negative whole number. Accepts 60 and 60.0, rejects 60.5 and -1.
fn count_field(obj: &Map<String, Value>, key: &str) -> Result<u32, PipelineError> {
    let bad = || PipelineError::MalformedInput(format!(
        "'{key}' must be a non-negative whole number, got {}", obj[key]
    ));

    let n = obj[key].as_f64().ok_or_else(bad)?;
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(bad());
    }
    Ok(n as u32)
}

/// Non-negative number or null. `max` bounds the value when given.
fn optional_number(
    obj: &Map<String, Value>,
    key: &str,
    max: Option<f64>,
) -> Result<Option<f64>, PipelineError> {
    let value = &obj[key];
    if value.is_null() {
        return Ok(None);
    }

    let n = value.as_f64().ok_or_else(|| PipelineError::MalformedInput(format!(
        "'{key}' must be a number or null, got {value}"
    )))?;

    let upper = max.unwrap_or(f64::INFINITY);
    if !n.is_finite() || n < 0.0 || n > upper {
        return Err(PipelineError::MalformedInput(format!(
            "'{key}' is out of range: {n}"
        )));
    }
    Ok(Some(n))
}

// ─── Responses ────────────────────────────────────────────────────────────────
/// Successful prediction with its additive explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// "Pass" or "Fail"
    pub prediction: String,

    /// One signed contribution per feature, keyed by feature name
    pub attributions: BTreeMap<String, f64>,

    /// Expected model output with no feature information
    pub baseline: f64,

    /// Raw decision score: baseline + sum(attributions)
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind:    String,
    pub message: String,
}

/// Structured per-request failure. The process keeps serving after one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl From<&PipelineError> for ErrorResponse {
    fn from(e: &PipelineError) -> Self {
        Self {
            error: ErrorBody {
                kind:    e.kind().to_string(),
                message: e.to_string(),
            },
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "gender": "F",
            "region": "North",
            "highest_education": "HE Qualification",
            "age_band": "35-55",
            "num_of_prev_attempts": 0,
            "studied_credits": 60,
            "total_clicks": 150,
            "avg_assessment_score": 72
        })
    }

    #[test]
    fn test_parses_valid_request() {
        let r = parse_request(&valid()).unwrap();
        assert_eq!(r.gender, "F");
        assert_eq!(r.studied_credits, 60);
        assert_eq!(r.total_clicks, Some(150.0));
        assert_eq!(r.avg_assessment_score, Some(72.0));
        assert!(r.final_result.is_none());
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let mut body = valid();
        body.as_object_mut().unwrap().remove("studied_credits");
        let err = parse_request(&body).unwrap_err();
        assert_eq!(err.kind(), "MalformedInput");
        assert!(err.to_string().contains("studied_credits"));
    }

    #[test]
    fn test_extra_field_is_malformed() {
        let mut body = valid();
        body.as_object_mut().unwrap().insert("imd_band".into(), json!("0-10%"));
        assert_eq!(parse_request(&body).unwrap_err().kind(), "MalformedInput");
    }

    #[test]
    fn test_wrong_types_are_malformed() {
        let mut body = valid();
        body["gender"] = json!(1);
        assert!(matches!(parse_request(&body), Err(PipelineError::MalformedInput(_))));

        let mut body = valid();
        body["studied_credits"] = json!("sixty");
        assert!(matches!(parse_request(&body), Err(PipelineError::MalformedInput(_))));

        let mut body = valid();
        body["num_of_prev_attempts"] = json!(1.5);
        assert!(matches!(parse_request(&body), Err(PipelineError::MalformedInput(_))));
    }

    #[test]
    fn test_score_out_of_range() {
        let mut body = valid();
        body["avg_assessment_score"] = json!(140);
        assert!(matches!(parse_request(&body), Err(PipelineError::MalformedInput(_))));
    }

    #[test]
    fn test_null_aggregates_are_missing() {
        let mut body = valid();
        body["total_clicks"] = Value::Null;
        body["avg_assessment_score"] = Value::Null;
        let r = parse_request(&body).unwrap();
        assert!(r.total_clicks.is_none());
        assert!(r.avg_assessment_score.is_none());
    }

    #[test]
    fn test_non_object_is_malformed() {
        assert!(parse_request(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_error_response_shape() {
        let e = PipelineError::MalformedInput("x".into());
        let resp = ErrorResponse::from(&e);
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["error"]["kind"], "MalformedInput");
    }
}
