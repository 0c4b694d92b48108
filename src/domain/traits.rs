// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams the application layer programs against:
//   - StudentSource   → anything that yields merged student rows
//   - RequestHandler  → anything that turns a request body into
//                       a prediction + explanation
//
// The Predictor trait lives in the ml layer because it exposes
// model structure (trees) to the Explainer.

use anyhow::Result;
use serde_json::Value;

use crate::domain::error::PipelineError;
use crate::domain::record::MergedStudent;
use crate::domain::request::InferenceResponse;

// ─── StudentSource ────────────────────────────────────────────────────────────
/// Any component that can produce the merged per-student table.
///
/// Implementations:
///   - OuladLoader → joins the four OULAD-style CSV files
pub trait StudentSource {
    /// Load every student row. A missing or malformed source is an error.
    fn load_all(&self) -> Result<Vec<MergedStudent>>;
}

// ─── RequestHandler ───────────────────────────────────────────────────────────
/// Any component that serves inference requests.
///
/// Implementations:
///   - ServingContext → fitted preprocessor + model + explainer
pub trait RequestHandler {
    /// Validate, preprocess, predict and explain a single request.
    fn handle(&self, body: &Value) -> Result<InferenceResponse, PipelineError>;
}
