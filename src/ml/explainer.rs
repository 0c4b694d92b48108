// ============================================================
// Layer 5 — Explainer
// ============================================================
// Decomposes a predictor's margin into one additive contribution
// per feature:
//
//   baseline + Σ attributions[j] = predict_margin(row)
//
// The strategy is chosen from the predictor's ModelStructure tag:
//
//   TreeEnsemble → TreeExplainer
//                  Exact path-dependent TreeSHAP (Lundberg et al.,
//                  2018). Polynomial in tree depth, uses node covers,
//                  baseline = cover-weighted expected margin.
//
//   Other        → SamplingExplainer
//                  Permutation-sampled Shapley values against a
//                  background set. For each background row b and each
//                  sampled permutation, features are switched from b
//                  to x one at a time and each switch is credited with
//                  the change in margin. The credits of one walk sum to
//                  f(x) - f(b), so the estimate is exactly additive with
//                  baseline = mean f(b).
//
// ExplainerReference carries the baseline and background margins,
// so a long-lived caller computes them once and reuses them for
// every row it explains.
//
// Row width is checked against the predictor first; a mismatch is a
// DimensionMismatch error, never a silently truncated explanation.

use std::borrow::Cow;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;
use crate::ml::predictor::{ModelStructure, Predictor, TreeEnsembleView};
use crate::ml::tree::{DecisionTree, Node};

/// Settings for the sampling strategy (tree explanations are exact).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerConfig {
    /// Permutations sampled per background row
    pub n_permutations: usize,
    /// Rows of training data kept as the background set
    pub max_background: usize,
    pub seed: u64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            n_permutations: 16,
            max_background: 50,
            seed:           42,
        }
    }
}

/// One signed contribution per feature plus the reference output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub values:   Vec<f64>,
    pub baseline: f64,
}

impl Attribution {
    /// baseline + Σ values — equals the explained margin
    pub fn total(&self) -> f64 {
        self.baseline + self.values.iter().sum::<f64>()
    }
}

/// Quantities fixed for one model and background set: the baseline and,
/// for the sampling strategy, the margin of every background row.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainerReference {
    pub baseline: f64,
    /// Empty for tree ensembles
    pub background_margins: Vec<f64>,
}

impl ExplainerReference {
    pub fn compute(
        predictor:  &dyn Predictor,
        background: &[Vec<f64>],
        config:     &ExplainerConfig,
    ) -> Result<Self, PipelineError> {
        if predictor.n_features() == 0 {
            return Err(PipelineError::NotTrained);
        }

        match predictor.structure() {
            ModelStructure::TreeEnsemble(view) => {
                let expected: f64 = view.trees.iter().map(DecisionTree::expected_value).sum();
                Ok(Self {
                    baseline:           view.bias + view.scale * expected,
                    background_margins: Vec::new(),
                })
            }
            ModelStructure::Other => {
                check_sampling_inputs(background, config)?;
                let background_margins = background
                    .iter()
                    .map(|b| predictor.predict_margin(b))
                    .collect::<Result<Vec<f64>, _>>()?;
                let baseline = background_margins.iter().sum::<f64>() / background_margins.len() as f64;
                Ok(Self { baseline, background_margins })
            }
        }
    }
}

fn check_sampling_inputs(background: &[Vec<f64>], config: &ExplainerConfig) -> Result<(), PipelineError> {
    if background.is_empty() {
        return Err(PipelineError::InvalidData(
            "sampling explainer needs a non-empty background set".into(),
        ));
    }
    if config.n_permutations == 0 {
        return Err(PipelineError::InvalidData("n_permutations must be at least 1".into()));
    }
    Ok(())
}

pub enum Explainer<'a> {
    Tree(TreeExplainer<'a>),
    Sampling(SamplingExplainer<'a>),
}

impl<'a> Explainer<'a> {
    /// Pick the explanation strategy from the predictor's structure tag.
    pub fn for_predictor(
        predictor:  &'a dyn Predictor,
        background: &'a [Vec<f64>],
        config:     &ExplainerConfig,
    ) -> Result<Self, PipelineError> {
        let reference = ExplainerReference::compute(predictor, background, config)?;
        Ok(Self::assemble(
            predictor,
            background,
            config,
            reference.baseline,
            Cow::Owned(reference.background_margins),
        ))
    }

    /// Reuse a reference computed earlier for the same predictor and background.
    pub fn with_reference(
        predictor:  &'a dyn Predictor,
        background: &'a [Vec<f64>],
        config:     &ExplainerConfig,
        reference:  &'a ExplainerReference,
    ) -> Result<Self, PipelineError> {
        if predictor.n_features() == 0 {
            return Err(PipelineError::NotTrained);
        }
        if let ModelStructure::Other = predictor.structure() {
            check_sampling_inputs(background, config)?;
            if reference.background_margins.len() != background.len() {
                return Err(PipelineError::InvalidData(format!(
                    "reference holds {} background margins for {} background rows",
                    reference.background_margins.len(),
                    background.len()
                )));
            }
        }

        Ok(Self::assemble(
            predictor,
            background,
            config,
            reference.baseline,
            Cow::Borrowed(&reference.background_margins),
        ))
    }

    fn assemble(
        predictor:          &'a dyn Predictor,
        background:         &'a [Vec<f64>],
        config:             &ExplainerConfig,
        baseline:           f64,
        background_margins: Cow<'a, [f64]>,
    ) -> Self {
        let n_features = predictor.n_features();
        match predictor.structure() {
            ModelStructure::TreeEnsemble(view) => {
                Explainer::Tree(TreeExplainer { view, n_features, baseline })
            }
            ModelStructure::Other => Explainer::Sampling(SamplingExplainer {
                predictor,
                background,
                background_margins,
                baseline,
                config: config.clone(),
            }),
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Explainer::Tree(_)     => "tree",
            Explainer::Sampling(_) => "sampling",
        }
    }

    pub fn baseline(&self) -> f64 {
        match self {
            Explainer::Tree(e)     => e.baseline,
            Explainer::Sampling(e) => e.baseline,
        }
    }

    pub fn explain(&self, row: &[f64]) -> Result<Attribution, PipelineError> {
        match self {
            Explainer::Tree(e)     => e.explain(row),
            Explainer::Sampling(e) => e.explain(row),
        }
    }

    pub fn explain_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<Attribution>, PipelineError> {
        rows.iter().map(|r| self.explain(r)).collect()
    }
}

/// Global importance: mean |attribution| per feature over a batch.
pub fn mean_abs_attributions(batch: &[Attribution]) -> Vec<f64> {
    let Some(first) = batch.first() else {
        return Vec::new();
    };
    let mut sums = vec![0.0; first.values.len()];
    for a in batch {
        for (s, v) in sums.iter_mut().zip(&a.values) {
            *s += v.abs();
        }
    }
    sums.iter().map(|s| s / batch.len() as f64).collect()
}

// ─── TreeExplainer ────────────────────────────────────────────────────────────
pub struct TreeExplainer<'a> {
    view:       TreeEnsembleView<'a>,
    n_features: usize,
    baseline:   f64,
}

impl<'a> TreeExplainer<'a> {
    pub fn explain(&self, row: &[f64]) -> Result<Attribution, PipelineError> {
        PipelineError::check_dimension(self.n_features, row.len())?;

        let mut values = vec![0.0; self.n_features];
        let mut phi    = vec![0.0; self.n_features];
        for tree in self.view.trees {
            phi.iter_mut().for_each(|p| *p = 0.0);
            tree_shap(tree, row, &mut phi);
            for (v, p) in values.iter_mut().zip(&phi) {
                *v += self.view.scale * p;
            }
        }

        Ok(Attribution { values, baseline: self.baseline })
    }
}

/// One entry of the feature path TreeSHAP carries down the tree.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature:       Option<usize>,
    zero_fraction: f64,
    one_fraction:  f64,
    weight:        f64,
}

/// Exact Shapley values of a single tree's output for `x`, added into `phi`.
pub fn tree_shap(tree: &DecisionTree, x: &[f64], phi: &mut [f64]) {
    let nodes = tree.nodes();
    if nodes.is_empty() {
        return;
    }
    recurse(nodes, tree.root(), x, phi, Vec::new(), 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    nodes:         &[Node],
    idx:           usize,
    x:             &[f64],
    phi:           &mut [f64],
    mut path:      Vec<PathElement>,
    zero_fraction: f64,
    one_fraction:  f64,
    feature:       Option<usize>,
) {
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match &nodes[idx] {
        Node::Leaf { value, .. } => {
            for i in 1..path.len() {
                let w  = unwound_path_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += w * (el.one_fraction - el.zero_fraction) * value;
                }
            }
        }
        Node::Split { feature: split, threshold, left, right, cover } => {
            let (hot, cold) = if x[*split] <= *threshold { (*left, *right) } else { (*right, *left) };

            // A feature already on the path is unwound so it is counted once
            let mut incoming_zero = 1.0;
            let mut incoming_one  = 1.0;
            if let Some(k) = (1..path.len()).find(|&k| path[k].feature == Some(*split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one  = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            let hot_share  = nodes[hot].cover() / cover;
            let cold_share = nodes[cold].cover() / cover;

            recurse(nodes, hot, x, phi, path.clone(), incoming_zero * hot_share, incoming_one, Some(*split));
            recurse(nodes, cold, x, phi, path, incoming_zero * cold_share, 0.0, Some(*split));
        }
    }
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let d1 = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / d1;
        path[i].weight      = zero_fraction * path[i].weight * (depth - i) as f64 / d1;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, i: usize) {
    let depth = path.len() - 1;
    let one   = path[i].one_fraction;
    let zero  = path[i].zero_fraction;
    let d1    = (depth + 1) as f64;
    let mut next = path[depth].weight;

    for j in (0..depth).rev() {
        if one != 0.0 {
            let tmp        = path[j].weight;
            path[j].weight = next * d1 / ((j + 1) as f64 * one);
            next           = tmp - path[j].weight * zero * (depth - j) as f64 / d1;
        } else {
            path[j].weight = path[j].weight * d1 / (zero * (depth - j) as f64);
        }
    }

    // Shift the fractions/features left over the removed slot; weights stay put
    for j in i..depth {
        path[j].feature       = path[j + 1].feature;
        path[j].zero_fraction = path[j + 1].zero_fraction;
        path[j].one_fraction  = path[j + 1].one_fraction;
    }
    path.pop();
}

fn unwound_path_sum(path: &[PathElement], i: usize) -> f64 {
    let depth = path.len() - 1;
    let one   = path[i].one_fraction;
    let zero  = path[i].zero_fraction;
    let d1    = (depth + 1) as f64;
    let mut next  = path[depth].weight;
    let mut total = 0.0;

    for j in (0..depth).rev() {
        if one != 0.0 {
            let tmp = next * d1 / ((j + 1) as f64 * one);
            total  += tmp;
            next    = path[j].weight - tmp * zero * (depth - j) as f64 / d1;
        } else {
            total += path[j].weight / zero * d1 / (depth - j) as f64;
        }
    }
    total
}

// ─── SamplingExplainer ────────────────────────────────────────────────────────
pub struct SamplingExplainer<'a> {
    predictor:  &'a dyn Predictor,
    background: &'a [Vec<f64>],
    /// Margin of every background row, computed once
    background_margins: Cow<'a, [f64]>,
    baseline: f64,
    config:   ExplainerConfig,
}

impl<'a> SamplingExplainer<'a> {
    pub fn explain(&self, row: &[f64]) -> Result<Attribution, PipelineError> {
        let d = self.predictor.n_features();
        PipelineError::check_dimension(d, row.len())?;

        // Fresh generator per call: the same row always gets the same answer
        let mut rng    = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..d).collect();
        let mut values = vec![0.0; d];

        for (b, &b_margin) in self.background.iter().zip(self.background_margins.iter()) {
            for _ in 0..self.config.n_permutations {
                order.shuffle(&mut rng);

                let mut z    = b.clone();
                let mut prev = b_margin;
                for &j in &order {
                    z[j] = row[j];
                    let cur = self.predictor.predict_margin(&z)?;
                    values[j] += cur - prev;
                    prev = cur;
                }
            }
        }

        let walks = (self.background.len() * self.config.n_permutations) as f64;
        values.iter_mut().for_each(|v| *v /= walks);

        Ok(Attribution { values, baseline: self.baseline })
    }
}
