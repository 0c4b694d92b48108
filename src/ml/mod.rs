// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// Everything that learns from feature vectors or explains what
// was learned. No file I/O and no CSV parsing here; this layer
// only sees Vec<f64> rows and 0/1 labels.
//
// What's in this layer:
//
//   tree.rs      — Arena-based regression tree shared by both
//                  ensembles. Records per-node cover for TreeSHAP.
//
//   forest.rs    — Bagged random forest (rayon, seeded per tree)
//
//   boosting.rs  — Log-loss gradient boosting with Newton leaves
//
//   network.rs   — One-hidden-layer network on ndarray, trained
//                  with full-batch Adam. The non-tree predictor.
//
//   predictor.rs — The Predictor trait, the ModelStructure tag
//                  and the serialisable Model enum
//
//   explainer.rs — Additive per-feature attributions:
//                  exact TreeSHAP for tree ensembles,
//                  permutation sampling for everything else
//
// Reference: Breiman (2001) Random Forests
//            Friedman (2001) Greedy Function Approximation
//            Lundberg et al. (2018) Consistent Individualized
//            Feature Attribution for Tree Ensembles

/// Regression tree with cover bookkeeping
pub mod tree;

/// Random forest classifier
pub mod forest;

/// Gradient-boosted trees
pub mod boosting;

/// Small feed-forward network
pub mod network;

/// Predictor trait and the Model enum
pub mod predictor;

/// TreeSHAP and sampling explainers
pub mod explainer;

#[cfg(test)]
pub mod test_support;
