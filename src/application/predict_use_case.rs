// ============================================================
// Layer 2 — Predict Use Case (serving path)
// ============================================================
// Turns inference requests into explained predictions:
//
//   Step 1: Validate the request body      (Layer 3 - domain)
//   Step 2: Transform with the PERSISTED   (Layer 4 - data)
//           encoding + scaling parameters
//   Step 3: Margin → Pass / Fail           (Layer 5 - ml)
//   Step 4: Additive attribution per       (Layer 5 - ml)
//           feature
//
// ServingContext is built once from the training artifact and is
// read-only afterwards. Nothing here ever refits the preprocessor.
// A failed request becomes an error response and the next request
// is served normally.

use anyhow::{Context, Result};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    io::{BufRead, Write},
    path::Path,
};

use crate::data::preprocessor::{FittedPreprocessor, FEATURE_NAMES};
use crate::domain::error::PipelineError;
use crate::domain::record::Outcome;
use crate::domain::request::{parse_request, ErrorResponse, InferenceResponse};
use crate::domain::traits::RequestHandler;
use crate::infra::artifact::{ArtifactBundle, ArtifactStore};
use crate::ml::explainer::{Explainer, ExplainerConfig, ExplainerReference};
use crate::ml::predictor::{Model, Predictor};

/// Everything a request needs, loaded once at startup.
pub struct ServingContext {
    preprocessor: FittedPreprocessor,
    model:        Model,
    background:   Vec<Vec<f64>>,
    explainer:    ExplainerConfig,
    /// Baseline and background margins, computed once per artifact
    reference:    ExplainerReference,
}

impl ServingContext {
    /// Load artifact.json from `dir`. Any problem is fatal to the caller.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let bundle = ArtifactStore::new(dir.as_ref()).load()?;
        Self::from_bundle(bundle)
    }

    pub fn from_bundle(bundle: ArtifactBundle) -> Result<Self, PipelineError> {
        bundle.validate()?;

        let trained = &bundle.train_config;
        tracing::info!(
            "Artifact trained on '{}' (seed {}, test fraction {})",
            trained.data_dir,
            trained.seed,
            trained.test_fraction
        );

        // A broken background set surfaces here rather than on the first request
        let reference = ExplainerReference::compute(&bundle.model, &bundle.background, &bundle.explainer)
            .map_err(|e| PipelineError::ArtifactLoad(format!("explainer cannot be built: {e}")))?;

        let ctx = Self {
            preprocessor: bundle.preprocessor,
            model:        bundle.model,
            background:   bundle.background,
            explainer:    bundle.explainer,
            reference,
        };

        let strategy = ctx.explainer()?.strategy();
        tracing::info!(
            "Serving {} with the {} explainer (baseline {:.4})",
            ctx.model.name(),
            strategy,
            ctx.reference.baseline
        );
        Ok(ctx)
    }

    fn explainer(&self) -> Result<Explainer<'_>, PipelineError> {
        Explainer::with_reference(&self.model, &self.background, &self.explainer, &self.reference)
            .map_err(|e| PipelineError::ArtifactLoad(format!("explainer cannot be built: {e}")))
    }
}

impl RequestHandler for ServingContext {
    fn handle(&self, body: &Value) -> Result<InferenceResponse, PipelineError> {
        let record = parse_request(body)?;
        let row    = self.preprocessor.transform(&record)?;

        let margin  = self.model.predict_margin(&row)?;
        let outcome = Outcome::from_label(u8::from(margin > self.model.decision_threshold()));

        let attribution = self.explainer()?.explain(&row)?;
        let attributions: BTreeMap<String, f64> = FEATURE_NAMES
            .iter()
            .map(|s| s.to_string())
            .zip(attribution.values.iter().copied())
            .collect();

        tracing::debug!("Predicted {} (margin {:.4})", outcome.as_str(), margin);
        Ok(InferenceResponse {
            prediction: outcome.as_str().to_string(),
            attributions,
            baseline: attribution.baseline,
            margin,
        })
    }
}

/// Counts from one batch of requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    pub served: usize,
    pub failed: usize,
}

/// Answer one request body with either a response or an error response.
pub fn respond(handler: &dyn RequestHandler, body: &Value) -> Result<String> {
    let json = match handler.handle(body) {
        Ok(response) => serde_json::to_string(&response)?,
        Err(e) => {
            tracing::warn!("Request rejected: {}", e);
            serde_json::to_string(&ErrorResponse::from(&e))?
        }
    };
    Ok(json)
}

/// Serve newline-delimited JSON requests, writing one JSON line per request.
/// Blank lines are skipped. A line that is not UTF-8 or not JSON gets a
/// MalformedInput response; only I/O failures end the loop.
pub fn serve_lines(
    handler: &dyn RequestHandler,
    input:   impl BufRead,
    mut out: impl Write,
) -> Result<ServeSummary> {
    let mut summary = ServeSummary::default();

    for (i, bytes) in input.split(b'\n').enumerate() {
        let line_no = i + 1;
        let bytes   = bytes.with_context(|| format!("Failed to read request line {line_no}"))?;

        let text = match String::from_utf8(bytes) {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => Ok(text),
            Err(e) => Err(PipelineError::MalformedInput(format!("line {line_no}: {e}"))),
        };

        let outcome = text
            .and_then(|text| {
                serde_json::from_str::<Value>(&text)
                    .map_err(|e| PipelineError::MalformedInput(format!("line {line_no}: {e}")))
            })
            .and_then(|body| handler.handle(&body));

        let json = match outcome {
            Ok(response) => {
                summary.served += 1;
                serde_json::to_string(&response)?
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!("Request on line {} rejected: {}", line_no, e);
                serde_json::to_string(&ErrorResponse::from(&e))?
            }
        };
        writeln!(out, "{json}")?;
    }

    Ok(summary)
}
