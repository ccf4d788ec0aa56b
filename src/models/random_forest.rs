//! Bagged ensemble of Gini classification trees.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeParams};
use super::{class_indices, validate_row, validate_training, ProbabilisticPredictor};
use crate::utils::error::{Error, Result};
use crate::utils::types::{SignalAction, N_CLASSES};

/// How many features each split may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MaxFeatures {
    /// floor(sqrt(n_features)), at least one
    Sqrt,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            | MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            | MaxFeatures::All => n_features,
            | MaxFeatures::Fixed(n) => n,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree (otherwise every tree sees all rows)
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    params: RandomForestParams,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn new() -> Self {
        Self::with_params(RandomForestParams::default())
    }

    pub fn with_params(params: RandomForestParams) -> Self {
        Self { params, trees: Vec::new(), n_features: 0 }
    }

    pub fn params(&self) -> &RandomForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbabilisticPredictor for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn fit(&mut self, rows: &[Vec<f64>], labels: &[SignalAction]) -> Result<()> {
        let n_features = validate_training(rows, labels)?;
        if self.params.n_estimators == 0 {
            return Err(Error::ConfigError("random forest needs at least one tree".into()));
        }
        let y = class_indices(labels);
        let n = rows.len();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: Some(self.params.max_features.resolve(n_features)),
        };

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let all: Vec<usize> = (0..n).collect();
        let mut trees = Vec::with_capacity(self.params.n_estimators);
        for _ in 0..self.params.n_estimators {
            let sample: Vec<usize> = if self.params.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                all.clone()
            };
            trees.push(DecisionTree::fit_classifier(
                rows,
                &y,
                &sample,
                N_CLASSES,
                tree_params,
                &mut rng,
            ));
        }

        info!("Trained random forest with {} trees on {} samples", trees.len(), n);
        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(Error::ModelNotTrained);
        }
        validate_row(row, self.n_features)?;
        let mut proba = vec![0.0; N_CLASSES];
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.predict(row)) {
                *p += v;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        Ok(proba)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn box_clone(&self) -> Box<dyn ProbabilisticPredictor> {
        Box::new(self.clone())
    }
}
