// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training a model or serving predictions).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - No direct CSV or artifact format details (Layers 4 and 6)
//   - Only workflow coordination

// The offline training workflow
pub mod train_use_case;

// The serving workflow: request → prediction + attribution
pub mod predict_use_case;

#[cfg(test)]
pub mod test_fixtures;
