// ============================================================
// Layer 5 — Decision Tree
// ============================================================
// One regression tree type serves both models. With 0/1 targets
// and unit hessians the variance criterion ranks splits exactly
// like Gini, and the leaf mean is the Pass probability (random forest). With
// gradient targets and per-sample hessians the leaf holds a Newton
// step (gradient boosting).
//
// Nodes live in a flat arena. Every node records its `cover` (the
// number of training samples that reached it); TreeSHAP needs it.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_depth:         usize,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    /// Features considered per split (None = all)
    pub max_features:      Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth:         10,
            min_samples_split: 5,
            min_samples_leaf:  2,
            max_features:      None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
        cover: f64,
    },
    Split {
        feature:   usize,
        threshold: f64,
        left:      usize,
        right:     usize,
        cover:     f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Leaf { cover, .. } | Node::Split { cover, .. } => *cover,
        }
    }
}

/// Borrowed view of the training data handed to the recursive builder.
struct FitData<'a> {
    features: &'a [Vec<f64>],
    targets:  &'a [f64],
    hessians: Option<&'a [f64]>,
    config:   &'a TreeConfig,
}

struct BestSplit {
    feature:   usize,
    threshold: f64,
    gain:      f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    root:  usize,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `indices` (duplicates allowed,
    /// which is how bootstrap samples arrive).
    ///
    /// Leaf value = Σ target / Σ hessian, with a hessian of 1 per row
    /// when `hessians` is None.
    pub fn fit(
        features: &[Vec<f64>],
        targets:  &[f64],
        hessians: Option<&[f64]>,
        indices:  &[usize],
        config:   &TreeConfig,
        rng:      &mut ChaCha8Rng,
    ) -> Self {
        let data = FitData { features, targets, hessians, config };
        let mut nodes = Vec::new();
        let root      = build(&data, &mut nodes, indices.to_vec(), 0, rng);
        Self { nodes, root }
    }

    /// Assemble a tree from an explicit node arena.
    pub(crate) fn from_nodes(nodes: Vec<Node>, root: usize) -> Self {
        Self { nodes, root }
    }

    /// Leaf value reached by `x`. The caller guarantees the row width.
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split { feature, threshold, left, right, .. } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root(&self) -> usize {
        self.root
    }

    /// Cover-weighted mean leaf value: the tree's output with no feature known.
    pub fn expected_value(&self) -> f64 {
        self.expected_from(self.root)
    }

    fn expected_from(&self, idx: usize) -> f64 {
        match &self.nodes[idx] {
            Node::Leaf { value, .. } => *value,
            Node::Split { left, right, cover, .. } => {
                let cl = self.nodes[*left].cover();
                let cr = self.nodes[*right].cover();
                (cl * self.expected_from(*left) + cr * self.expected_from(*right)) / cover
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.depth_from(self.root)
    }

    fn depth_from(&self, idx: usize) -> usize {
        match &self.nodes[idx] {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => {
                1 + self.depth_from(*left).max(self.depth_from(*right))
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Grow the subtree for `indices` and return its arena index.
fn build(
    data:    &FitData<'_>,
    nodes:   &mut Vec<Node>,
    indices: Vec<usize>,
    depth:   usize,
    rng:     &mut ChaCha8Rng,
) -> usize {
    // Reserve this node's slot so the parent index precedes its children
    let slot = nodes.len();
    let cover = indices.len() as f64;
    nodes.push(Node::Leaf {
        value: leaf_value(data, &indices),
        cover,
    });

    let cfg = data.config;
    if indices.is_empty()
        || depth >= cfg.max_depth
        || indices.len() < cfg.min_samples_split
        || is_pure(data, &indices)
    {
        return slot;
    }

    let Some(split) = best_split(data, &indices, rng) else {
        return slot;
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| data.features[i][split.feature] <= split.threshold);

    if left_idx.len() < cfg.min_samples_leaf.max(1) || right_idx.len() < cfg.min_samples_leaf.max(1)
    {
        return slot;
    }

    let left  = build(data, nodes, left_idx, depth + 1, rng);
    let right = build(data, nodes, right_idx, depth + 1, rng);

    nodes[slot] = Node::Split {
        feature:   split.feature,
        threshold: split.threshold,
        left,
        right,
        cover,
    };
    slot
}

fn leaf_value(data: &FitData<'_>, indices: &[usize]) -> f64 {
    let sum_t: f64 = indices.iter().map(|&i| data.targets[i]).sum();
    let sum_h: f64 = match data.hessians {
        Some(h) => indices.iter().map(|&i| h[i]).sum(),
        None => indices.len() as f64,
    };
    if sum_h < 1e-12 {
        0.0
    } else {
        sum_t / sum_h
    }
}

fn is_pure(data: &FitData<'_>, indices: &[usize]) -> bool {
    let first = data.targets[indices[0]];
    indices
        .iter()
        .all(|&i| (data.targets[i] - first).abs() < 1e-12)
}

/// Variance-reduction split search over a random subset of features.
///
/// Rows are sorted by the candidate feature and swept once with running
/// sums; the gain of a cut is ΣL²/nL + ΣR²/nR − Σ²/n.
fn best_split(data: &FitData<'_>, indices: &[usize], rng: &mut ChaCha8Rng) -> Option<BestSplit> {
    let n_features = data.features[indices[0]].len();
    let max_features = data
        .config
        .max_features
        .unwrap_or(n_features)
        .clamp(1, n_features);

    let mut candidates: Vec<usize> = (0..n_features).collect();
    candidates.shuffle(rng);
    candidates.truncate(max_features);
    // Stable evaluation order keeps tie-breaking independent of the shuffle
    candidates.sort_unstable();

    let min_leaf = data.config.min_samples_leaf.max(1);
    let n = indices.len();
    let total: f64 = indices.iter().map(|&i| data.targets[i]).sum();
    let parent_score = total * total / n as f64;

    let mut best: Option<BestSplit> = None;
    let mut sorted = indices.to_vec();

    for feature in candidates {
        sorted.sort_by(|&a, &b| data.features[a][feature].total_cmp(&data.features[b][feature]));

        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            left_sum += data.targets[sorted[pos]];

            let here = data.features[sorted[pos]][feature];
            let next = data.features[sorted[pos + 1]][feature];
            if here == next {
                continue;
            }

            let n_left = pos + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / n_left as f64
                + right_sum * right_sum / n_right as f64
                - parent_score;

            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let targets: Vec<f64> = (0..40).map(|i| if i >= 20 { 1.0 } else { 0.0 }).collect();
        (features, targets)
    }

    #[test]
    fn test_learns_a_step() {
        let (x, y) = step_data();
        let idx: Vec<usize> = (0..x.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, None, &idx, &TreeConfig::default(), &mut rng);

        assert_eq!(tree.predict(&[5.0, 0.0]), 0.0);
        assert_eq!(tree.predict(&[35.0, 1.0]), 1.0);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_covers_add_up() {
        let (x, y) = step_data();
        let idx: Vec<usize> = (0..x.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let cfg = TreeConfig {
            max_depth:         6,
            min_samples_split: 2,
            min_samples_leaf:  1,
            max_features:      None,
        };
        let tree = DecisionTree::fit(&x, &y, None, &idx, &cfg, &mut rng);

        for node in tree.nodes() {
            if let Node::Split { left, right, cover, .. } = node {
                let sum = tree.nodes()[*left].cover() + tree.nodes()[*right].cover();
                assert_eq!(sum, *cover);
            }
        }
        assert_eq!(tree.nodes()[tree.root()].cover(), 40.0);
    }

    #[test]
    fn test_expected_value_is_target_mean() {
        let (x, y) = step_data();
        let idx: Vec<usize> = (0..x.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, None, &idx, &TreeConfig::default(), &mut rng);
        assert!((tree.expected_value() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_newton_leaf_values() {
        let x = vec![vec![0.0], vec![1.0]];
        let g = vec![0.5, 0.5];
        let h = vec![0.25, 0.25];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &g, Some(&h), &[0, 1], &TreeConfig::default(), &mut rng);
        // Pure targets → single leaf holding Σg / Σh = 1.0 / 0.5
        assert_eq!(tree.nodes().len(), 1);
        assert!((tree.predict(&[0.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth_zero_is_a_stump_leaf() {
        let (x, y) = step_data();
        let idx: Vec<usize> = (0..x.len()).collect();
        let cfg = TreeConfig {
            max_depth: 0,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, None, &idx, &cfg, &mut rng);
        assert_eq!(tree.n_leaves(), 1);
        assert!((tree.predict(&[0.0, 0.0]) - 0.5).abs() < 1e-12);
    }
}
