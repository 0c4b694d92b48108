// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles the cross-cutting concerns that touch the filesystem
// but don't belong to the data pipeline or the models:
//
//   artifact.rs — Training artifact persistence
//                 Serialises the fitted preprocessor, trained
//                 model, background rows and configs to one
//                 versioned JSON bundle. Loading validates the
//                 version and feature layout before anything
//                 is served.
//
//   metrics.rs  — Evaluation logging
//                 Appends test-set accuracy / precision /
//                 recall / F1 to metrics.csv and writes the
//                 global feature importance table.

/// Versioned training artifact save/load
pub mod artifact;

/// Evaluation metrics and feature importance CSVs
pub mod metrics;
