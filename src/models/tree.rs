//! CART decision trees shared by the random forest (Gini classification trees) and the
//! gradient-boosting model (least-squares regression trees with caller-defined leaves).
//!
//! Trees are grown over a list of sample indices into a row-major feature matrix, so
//! bootstrap samples are expressed by repeating indices rather than copying rows.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of features drawn at each split; `None` = all features
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self { max_depth: 5, min_samples_split: 2, min_samples_leaf: 1, max_features: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: Vec<f64>,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn depth(&self) -> usize {
        match self {
            | TreeNode::Leaf { .. } => 1,
            | TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            | TreeNode::Leaf { .. } => 1,
            | TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Split quality criterion.
enum Criterion<'a> {
    Gini { labels: &'a [usize], n_classes: usize },
    SquaredError { targets: &'a [f64] },
}

/// Running sufficient statistics for one side of a candidate split.
#[derive(Clone)]
enum SideStats {
    Counts { counts: Vec<f64>, n: f64 },
    Moments { sum: f64, sum_sq: f64, n: f64 },
}

impl SideStats {
    fn empty(criterion: &Criterion<'_>) -> Self {
        match criterion {
            | Criterion::Gini { n_classes, .. } => {
                SideStats::Counts { counts: vec![0.0; *n_classes], n: 0.0 }
            }
            | Criterion::SquaredError { .. } => SideStats::Moments { sum: 0.0, sum_sq: 0.0, n: 0.0 },
        }
    }

    fn add(&mut self, criterion: &Criterion<'_>, i: usize, sign: f64) {
        match (self, criterion) {
            | (SideStats::Counts { counts, n }, Criterion::Gini { labels, .. }) => {
                counts[labels[i]] += sign;
                *n += sign;
            }
            | (SideStats::Moments { sum, sum_sq, n }, Criterion::SquaredError { targets }) => {
                let y = targets[i];
                *sum += sign * y;
                *sum_sq += sign * y * y;
                *n += sign;
            }
            | _ => unreachable!("side statistics always match the criterion"),
        }
    }

    fn n(&self) -> f64 {
        match self {
            | SideStats::Counts { n, .. } | SideStats::Moments { n, .. } => *n,
        }
    }

    /// Impurity multiplied by the sample count (so sides can be summed directly).
    fn weighted_impurity(&self) -> f64 {
        match self {
            | SideStats::Counts { counts, n } => {
                if *n <= 0.0 {
                    return 0.0;
                }
                let sum_sq: f64 = counts.iter().map(|c| (c / n) * (c / n)).sum();
                n * (1.0 - sum_sq)
            }
            | SideStats::Moments { sum, sum_sq, n } => {
                if *n <= 0.0 {
                    return 0.0;
                }
                (sum_sq - sum * sum / n).max(0.0)
            }
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct Grower<'a, R: Rng, L: Fn(&[usize]) -> Vec<f64>> {
    x: &'a [Vec<f64>],
    criterion: Criterion<'a>,
    params: TreeParams,
    rng: &'a mut R,
    leaf_value: L,
}

impl<'a, R: Rng, L: Fn(&[usize]) -> Vec<f64>> Grower<'a, R, L> {
    fn grow(&mut self, indices: &[usize], depth: usize) -> TreeNode {
        let mut stats = SideStats::empty(&self.criterion);
        for &i in indices {
            stats.add(&self.criterion, i, 1.0);
        }
        let node_impurity = stats.weighted_impurity();

        if depth >= self.params.max_depth
            || indices.len() < self.params.min_samples_split
            || indices.len() < 2 * self.params.min_samples_leaf.max(1)
            || node_impurity <= 1e-12
        {
            return self.leaf(indices);
        }

        let Some(best) = self.best_split(indices, &stats, node_impurity) else {
            return self.leaf(indices);
        };

        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| self.x[i][best.feature] <= best.threshold);
        let left = Box::new(self.grow(&left, depth + 1));
        let right = Box::new(self.grow(&right, depth + 1));
        TreeNode::Split { feature: best.feature, threshold: best.threshold, left, right }
    }

    fn leaf(&self, indices: &[usize]) -> TreeNode {
        TreeNode::Leaf { value: (self.leaf_value)(indices), n_samples: indices.len() }
    }

    fn best_split(
        &mut self, indices: &[usize], total: &SideStats, node_impurity: f64,
    ) -> Option<BestSplit> {
        let n_features = self.x[indices[0]].len();
        let max_features = self.params.max_features.unwrap_or(n_features).clamp(1, n_features);
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut *self.rng);

        let min_leaf = self.params.min_samples_leaf.max(1) as f64;
        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();
        let mut visited = 0;

        // constant features do not count towards max_features
        for feature in features {
            if visited == max_features {
                break;
            }
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let lo = self.x[sorted[0]][feature];
            let hi = self.x[sorted[sorted.len() - 1]][feature];
            if lo >= hi {
                continue;
            }
            visited += 1;
            let mut left = SideStats::empty(&self.criterion);
            let mut right = total.clone();

            for k in 0..sorted.len() - 1 {
                let i = sorted[k];
                left.add(&self.criterion, i, 1.0);
                right.add(&self.criterion, i, -1.0);

                let here = self.x[i][feature];
                let next = self.x[sorted[k + 1]][feature];
                if here >= next || left.n() < min_leaf || right.n() < min_leaf {
                    continue;
                }
                let impurity = left.weighted_impurity() + right.weighted_impurity();
                if impurity + 1e-12 >= node_impurity {
                    continue;
                }
                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = here + (next - here) / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some(BestSplit { feature, threshold, impurity });
                }
            }
        }
        best
    }
}

/// A fitted decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

impl DecisionTree {
    /// Grow a Gini classification tree; leaves hold the class distribution of their samples.
    pub fn fit_classifier<R: Rng>(
        x: &[Vec<f64>], labels: &[usize], indices: &[usize], n_classes: usize,
        params: TreeParams, rng: &mut R,
    ) -> Self {
        let leaf_value = |idx: &[usize]| {
            let mut dist = vec![0.0; n_classes];
            for &i in idx {
                dist[labels[i]] += 1.0;
            }
            let n = idx.len().max(1) as f64;
            dist.iter_mut().for_each(|d| *d /= n);
            dist
        };
        let mut grower =
            Grower { x, criterion: Criterion::Gini { labels, n_classes }, params, rng, leaf_value };
        Self { root: grower.grow(indices, 0) }
    }

    /// Grow a least-squares regression tree on `targets`; each leaf stores the single
    /// value returned by `leaf_value` for the samples that reached it.
    pub fn fit_regressor<R: Rng, F: Fn(&[usize]) -> f64>(
        x: &[Vec<f64>], targets: &[f64], indices: &[usize], params: TreeParams, rng: &mut R,
        leaf_value: F,
    ) -> Self {
        let mut grower = Grower {
            x,
            criterion: Criterion::SquaredError { targets },
            params,
            rng,
            leaf_value: |idx: &[usize]| vec![leaf_value(idx)],
        };
        Self { root: grower.grow(indices, 0) }
    }

    /// Leaf value reached by `row`.
    pub fn predict(&self, row: &[f64]) -> &[f64] {
        let mut node = &self.root;
        loop {
            match node {
                | TreeNode::Leaf { value, .. } => return value,
                | TreeNode::Split { feature, threshold, left, right } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }
}
