// ============================================================
// Layer 5 — Test Support
// ============================================================
// Deterministic fixtures shared by the model and explainer tests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// `n` rows of `d` features in [-1, 1] labelled by the sign of
/// x0 + 0.5·x1. Points too close to the boundary are redrawn so the
/// classes are cleanly separable.
pub fn separable_data(n: usize, d: usize) -> (Vec<Vec<f64>>, Vec<u8>) {
    let mut rng = ChaCha8Rng::seed_from_u64(n as u64 * 31 + d as u64);
    let mut features = Vec::with_capacity(n);
    let mut labels   = Vec::with_capacity(n);

    while features.len() < n {
        let row: Vec<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let score = row[0] + if d > 1 { 0.5 * row[1] } else { 0.0 };
        if score.abs() < 0.1 {
            continue;
        }
        labels.push(u8::from(score > 0.0));
        features.push(row);
    }

    (features, labels)
}
