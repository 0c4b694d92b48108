// ============================================================
// Layer 5 — Feed-forward Network (non-tree predictor)
// ============================================================
// A small dense network for binary classification:
//
//   input [n_features]
//     → Linear(n_features → hidden) → ReLU
//     → Linear(hidden → 1)          → logit
//
// The logit is the margin; sigmoid(logit) > 0.5 ⇔ logit > 0.
// This predictor exposes no tree structure, so explanations for
// it go through the sampling explainer.
//
// Training: full-batch binary cross-entropy with Adam
//   m = β1*m + (1-β1)*g
//   v = β2*v + (1-β2)*g²
//   θ = θ - lr * m̂ / (√v̂ + ε)
// Weights start from a seeded Xavier-uniform draw, so the same
// config and data always give the same network.

use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::data::dataset::validate_training_data;
use crate::domain::error::PipelineError;
use crate::ml::predictor::{check_input, ModelStructure, Predictor};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    /// Width of the hidden layer
    pub hidden: usize,
    /// Full passes over the training set
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            hidden:        32,
            epochs:        500,
            learning_rate: 0.01,
            seed:          42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralNet {
    config: NetConfig,
    /// Hidden weights, shape [hidden, n_features]
    w1: Array2<f64>,
    b1: Array1<f64>,
    /// Output weights, shape [hidden]
    w2: Array1<f64>,
    b2: f64,
    n_features: usize,
}

/// First and second moment estimates for one parameter tensor
struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(p: &Array<f64, D>) -> Self {
        Self { m: Array::zeros(p.raw_dim()), v: Array::zeros(p.raw_dim()) }
    }

    fn step(&mut self, param: &mut Array<f64, D>, grad: &Array<f64, D>, t: i32, lr: f64) {
        let c1 = 1.0 - BETA1.powi(t);
        let c2 = 1.0 - BETA2.powi(t);
        Zip::from(param)
            .and(grad)
            .and(&mut self.m)
            .and(&mut self.v)
            .for_each(|p, &g, m, v| {
                *m = BETA1 * *m + (1.0 - BETA1) * g;
                *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                *p -= lr * (*m / c1) / ((*v / c2).sqrt() + EPSILON);
            });
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl NeuralNet {
    pub fn new(config: NetConfig) -> Self {
        Self {
            config,
            w1: Array2::zeros((0, 0)),
            b1: Array1::zeros(0),
            w2: Array1::zeros(0),
            b2: 0.0,
            n_features: 0,
        }
    }

    /// Forward pass for a batch: (pre-activations, hidden activations, logits)
    fn forward(&self, x: &Array2<f64>) -> (Array2<f64>, Array2<f64>, Array1<f64>) {
        let pre    = x.dot(&self.w1.t()) + &self.b1;
        let hidden = pre.mapv(|v| v.max(0.0));
        let logits = hidden.dot(&self.w2) + self.b2;
        (pre, hidden, logits)
    }
}

impl Predictor for NeuralNet {
    fn name(&self) -> &'static str {
        "neural_net"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn train(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), PipelineError> {
        validate_training_data(features, labels)?;
        let cfg = self.config.clone();
        if cfg.hidden == 0 {
            return Err(PipelineError::InvalidData("hidden layer must not be empty".into()));
        }

        let n = features.len();
        let d = features[0].len();
        let x = Array2::from_shape_fn((n, d), |(i, j)| features[i][j]);
        let y = Array1::from_iter(labels.iter().map(|&l| l as f64));

        // ── Xavier-uniform initialisation ─────────────────────────────────────
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let limit1  = (6.0 / (d + cfg.hidden) as f64).sqrt();
        let limit2  = (6.0 / (cfg.hidden + 1) as f64).sqrt();
        self.w1 = Array2::from_shape_fn((cfg.hidden, d), |_| rng.gen_range(-limit1..limit1));
        self.b1 = Array1::zeros(cfg.hidden);
        self.w2 = Array1::from_shape_fn(cfg.hidden, |_| rng.gen_range(-limit2..limit2));
        self.b2 = 0.0;
        self.n_features = d;

        let mut mw1 = Moments::zeros_like(&self.w1);
        let mut mb1 = Moments::zeros_like(&self.b1);
        let mut mw2 = Moments::zeros_like(&self.w2);
        let (mut mb2, mut vb2) = (0.0_f64, 0.0_f64);

        for epoch in 1..=cfg.epochs {
            let (pre, hidden, logits) = self.forward(&x);

            // dL/dz for mean BCE over sigmoid outputs
            let probs = logits.mapv(sigmoid);
            let dz    = (&probs - &y) / n as f64;

            // ── Output layer gradients ────────────────────────────────────────
            let g_w2 = hidden.t().dot(&dz);
            let g_b2 = dz.sum();

            // ── Hidden layer gradients (ReLU mask) ────────────────────────────
            let mut d_pre = dz.view().insert_axis(Axis(1)).dot(&self.w2.view().insert_axis(Axis(0)));
            Zip::from(&mut d_pre).and(&pre).for_each(|g, &p| {
                if p <= 0.0 {
                    *g = 0.0;
                }
            });
            let g_w1 = d_pre.t().dot(&x);
            let g_b1 = d_pre.sum_axis(Axis(0));

            // ── Adam updates ──────────────────────────────────────────────────
            let t = epoch.min(i32::MAX as usize) as i32;
            mw1.step(&mut self.w1, &g_w1, t, cfg.learning_rate);
            mb1.step(&mut self.b1, &g_b1, t, cfg.learning_rate);
            mw2.step(&mut self.w2, &g_w2, t, cfg.learning_rate);

            mb2 = BETA1 * mb2 + (1.0 - BETA1) * g_b2;
            vb2 = BETA2 * vb2 + (1.0 - BETA2) * g_b2 * g_b2;
            let m_hat = mb2 / (1.0 - BETA1.powi(t));
            let v_hat = vb2 / (1.0 - BETA2.powi(t));
            self.b2 -= cfg.learning_rate * m_hat / (v_hat.sqrt() + EPSILON);

            if epoch % 100 == 0 {
                let loss = probs
                    .iter()
                    .zip(y.iter())
                    .map(|(&p, &t)| {
                        let p = p.clamp(1e-15, 1.0 - 1e-15);
                        -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
                    })
                    .sum::<f64>()
                    / n as f64;
                tracing::debug!("Network epoch {:>4}/{}: loss {:.5}", epoch, cfg.epochs, loss);
            }
        }

        Ok(())
    }

    fn predict_margin(&self, features: &[f64]) -> Result<f64, PipelineError> {
        check_input(self.n_features, features)?;
        let x      = Array1::from_iter(features.iter().copied());
        let hidden = (self.w1.dot(&x) + &self.b1).mapv(|v| v.max(0.0));
        Ok(hidden.dot(&self.w2) + self.b2)
    }

    fn decision_threshold(&self) -> f64 {
        0.0
    }

    fn structure(&self) -> ModelStructure<'_> {
        ModelStructure::Other
    }
}
