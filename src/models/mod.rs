//! Probabilistic classifiers used by the signal ensemble.
//!
//! Each model implements [`ProbabilisticPredictor`], so the ensemble combinator only sees
//! `fit` / `predict_proba` and never the concrete statistical model behind a slot.

pub mod gradient_boosting;
pub mod random_forest;
pub mod scaler;
pub mod tree;

pub use gradient_boosting::{GradientBoosting, GradientBoostingParams};
pub use random_forest::{MaxFeatures, RandomForest, RandomForestParams};
pub use scaler::StandardScaler;

use crate::utils::error::{Error, Result};
use crate::utils::types::SignalAction;

/// Classifier interface: fit on labelled rows, emit a class distribution per row.
pub trait ProbabilisticPredictor: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Fit on a row-major feature matrix and a parallel label sequence.
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[SignalAction]) -> Result<()>;

    /// Probability of every class, indexed by [`SignalAction::class_index`].
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>>;

    fn is_fitted(&self) -> bool;

    /// Clone boxed trait-objects safely.
    fn box_clone(&self) -> Box<dyn ProbabilisticPredictor>;
}

impl Clone for Box<dyn ProbabilisticPredictor> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Check a training set and return its feature count.
pub(crate) fn validate_training(rows: &[Vec<f64>], labels: &[SignalAction]) -> Result<usize> {
    if rows.is_empty() {
        return Err(Error::data("training data is empty"));
    }
    if rows.len() != labels.len() {
        return Err(Error::data(format!(
            "{} feature rows but {} labels",
            rows.len(),
            labels.len()
        )));
    }
    let n_features = rows[0].len();
    if n_features == 0 {
        return Err(Error::data("feature rows have no columns"));
    }
    for row in rows {
        validate_row(row, n_features)?;
    }
    Ok(n_features)
}

pub(crate) fn validate_row(row: &[f64], n_features: usize) -> Result<()> {
    if row.len() != n_features {
        return Err(Error::data(format!("expected {} features, got {}", n_features, row.len())));
    }
    if row.iter().any(|v| !v.is_finite()) {
        return Err(Error::data("feature row contains non-finite values"));
    }
    Ok(())
}

pub(crate) fn class_indices(labels: &[SignalAction]) -> Vec<usize> {
    labels.iter().map(|l| l.class_index()).collect()
}
