// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer takes the raw OULAD CSV exports all the way to
// numeric feature vectors a predictor can train on.
//
// The pipeline flows in this order:
//
//   studentInfo / studentVle / assessments / studentAssessment
//       │
//       ▼
//   OuladLoader       → reads the four tables, aggregates clicks
//       │               and weighted scores, left-joins per student
//       ▼
//   split_train_test  → seeded shuffle into train / test records
//       │
//       ▼
//   Preprocessor      → fits label encodings + standard scaling
//       │               on the training records only
//       ▼
//   FittedPreprocessor→ turns any record into a FeatureVector
//       │
//       ▼
//   FeatureTable      → validated (features, labels) pair
//
// Each module is responsible for exactly one step.
// This makes each step independently testable and replaceable.

/// Reads and merges the OULAD tables using the csv crate
pub mod loader;

/// Label encoding, missing-value fill and standard scaling
pub mod preprocessor;

/// Validated feature/label tables
pub mod dataset;

/// Seeded train/test split
pub mod splitter;
