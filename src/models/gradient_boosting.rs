//! Multinomial gradient boosting with least-squares regression trees.
//!
//! Every boosting stage fits one tree per class to the negative gradient of the
//! multinomial deviance (`y_k - p_k`) and sets leaf values with a single Newton step.
//! Raw scores start at the log class priors; probabilities are their softmax.

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeParams};
use super::{class_indices, validate_row, validate_training, ProbabilisticPredictor};
use crate::utils::error::{Error, Result};
use crate::utils::types::{SignalAction, N_CLASSES};

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    /// Number of boosting stages
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) per stage
    pub subsample: f64,
    pub seed: u64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 3,
            learning_rate: 0.1,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    params: GradientBoostingParams,
    init_scores: Vec<f64>,
    /// One tree per class per stage
    stages: Vec<Vec<DecisionTree>>,
    n_features: usize,
}

impl GradientBoosting {
    pub fn new() -> Self {
        Self::with_params(GradientBoostingParams::default())
    }

    pub fn with_params(params: GradientBoostingParams) -> Self {
        Self { params, init_scores: Vec::new(), stages: Vec::new(), n_features: 0 }
    }

    pub fn params(&self) -> &GradientBoostingParams {
        &self.params
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    fn raw_scores(&self, row: &[f64]) -> Vec<f64> {
        let mut scores = self.init_scores.clone();
        for stage in &self.stages {
            for (k, tree) in stage.iter().enumerate() {
                scores[k] += self.params.learning_rate * tree.predict(row)[0];
            }
        }
        scores
    }
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self::new()
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / total).collect()
}

impl ProbabilisticPredictor for GradientBoosting {
    fn name(&self) -> &str {
        "gradient_boosting"
    }

    fn fit(&mut self, rows: &[Vec<f64>], labels: &[SignalAction]) -> Result<()> {
        let n_features = validate_training(rows, labels)?;
        let p = self.params;
        let valid = p.n_estimators > 0
            && p.learning_rate > 0.0
            && p.subsample > 0.0
            && p.subsample <= 1.0;
        if !valid {
            return Err(Error::ConfigError(format!("invalid gradient boosting parameters: {:?}", p)));
        }

        let y = class_indices(labels);
        let n = rows.len();
        let k_factor = (N_CLASSES as f64 - 1.0) / N_CLASSES as f64;

        let mut counts = [0.0; N_CLASSES];
        for &c in &y {
            counts[c] += 1.0;
        }
        let init_scores: Vec<f64> =
            counts.iter().map(|c| (c / n as f64).max(f64::EPSILON).ln()).collect();

        let tree_params = TreeParams {
            max_depth: p.max_depth,
            min_samples_split: p.min_samples_split,
            min_samples_leaf: p.min_samples_leaf,
            max_features: None,
        };
        let mut rng = StdRng::seed_from_u64(p.seed);
        let mut scores: Vec<Vec<f64>> = vec![init_scores.clone(); n];
        let mut all: Vec<usize> = (0..n).collect();
        let n_sample = ((n as f64 * p.subsample).round() as usize).clamp(1, n);
        let mut stages = Vec::with_capacity(p.n_estimators);

        for _ in 0..p.n_estimators {
            let probs: Vec<Vec<f64>> = scores.iter().map(|s| softmax(s)).collect();
            let sample: Vec<usize> = if n_sample < n {
                all.shuffle(&mut rng);
                all[..n_sample].to_vec()
            } else {
                (0..n).collect()
            };

            let mut stage = Vec::with_capacity(N_CLASSES);
            for k in 0..N_CLASSES {
                let residual: Vec<f64> = (0..n)
                    .map(|i| (if y[i] == k { 1.0 } else { 0.0 }) - probs[i][k])
                    .collect();
                let newton_leaf = |leaf: &[usize]| {
                    let num: f64 = leaf.iter().map(|&i| residual[i]).sum();
                    let den: f64 = leaf
                        .iter()
                        .map(|&i| residual[i].abs() * (1.0 - residual[i].abs()))
                        .sum();
                    if den.abs() < 1e-150 {
                        0.0
                    } else {
                        k_factor * num / den
                    }
                };
                let tree = DecisionTree::fit_regressor(
                    rows,
                    &residual,
                    &sample,
                    tree_params,
                    &mut rng,
                    newton_leaf,
                );
                for (i, row) in rows.iter().enumerate() {
                    scores[i][k] += p.learning_rate * tree.predict(row)[0];
                }
                stage.push(tree);
            }
            stages.push(stage);
        }

        info!("Trained gradient boosting with {} stages on {} samples", stages.len(), n);
        self.init_scores = init_scores;
        self.stages = stages;
        self.n_features = n_features;
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(Error::ModelNotTrained);
        }
        validate_row(row, self.n_features)?;
        Ok(softmax(&self.raw_scores(row)))
    }

    fn is_fitted(&self) -> bool {
        !self.init_scores.is_empty()
    }

    fn box_clone(&self) -> Box<dyn ProbabilisticPredictor> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn toy() -> (Vec<Vec<f64>>, Vec<SignalAction>) {
        (0..60)
            .map(|i| {
                let z = (i as f64 - 30.0) / 8.0;
                let label = if z < -2.0 {
                    SignalAction::Buy
                } else if z > 2.0 {
                    SignalAction::Sell
                } else {
                    SignalAction::Hold
                };
                (vec![z, 1.0], label)
            })
            .unzip()
    }

    #[test]
    fn softmax_is_a_distribution() {
        let p = softmax(&[1000.0, 0.0, -1000.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[0] > 0.999);
    }

    #[test]
    fn boosting_separates_classes() {
        let (rows, labels) = toy();
        let mut gb = GradientBoosting::with_params(GradientBoostingParams {
            n_estimators: 50,
            ..Default::default()
        });
        gb.fit(&rows, &labels).unwrap();
        assert_eq!(gb.n_stages(), 50);

        let sell = gb.predict_proba(&[3.5, 1.0]).unwrap();
        assert!(sell[SignalAction::Sell.class_index()] > 0.9);
        let hold = gb.predict_proba(&[0.0, 1.0]).unwrap();
        assert!(hold[SignalAction::Hold.class_index()] > 0.9);
        assert!((hold.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_class_training_predicts_that_class() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let labels = vec![SignalAction::Hold; 3];
        let mut gb = GradientBoosting::with_params(GradientBoostingParams {
            n_estimators: 5,
            ..Default::default()
        });
        gb.fit(&rows, &labels).unwrap();
        let p = gb.predict_proba(&[2.0]).unwrap();
        assert!(p[SignalAction::Hold.class_index()] > 0.99);
    }

    #[test]
    fn rejects_invalid_parameters_and_untrained_use() {
        let (rows, labels) = toy();
        let mut gb = GradientBoosting::with_params(GradientBoostingParams {
            learning_rate: 0.0,
            ..Default::default()
        });
        assert_matches!(gb.fit(&rows, &labels), Err(Error::ConfigError(_)));
        assert_matches!(gb.predict_proba(&[0.0, 1.0]), Err(Error::ModelNotTrained));
    }
}
