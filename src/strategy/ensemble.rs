//! Two-model signal ensemble over spread features.
//!
//! The normaliser is fitted once during training and reused unchanged for every
//! inference call; refitting at inference would leak the evaluated row into the scaling
//! and move the decision boundary.

use log::{debug, info};

use super::fusion::{decide, fuse};
use crate::analysis::FeatureVector;
use crate::config::EnsembleConfig;
use crate::models::{
    validate_training, GradientBoosting, ProbabilisticPredictor, RandomForest, StandardScaler,
};
use crate::utils::error::{Error, Result};
use crate::utils::types::{Signal, SignalAction, N_CLASSES};

/// Label a step for training: a cheap spread (z below `-entry_z`) is a buy, a rich
/// spread (z above `entry_z`) a sell, anything in between a hold.
pub fn label_from_z_score(z_score: f64, entry_z: f64) -> SignalAction {
    if z_score < -entry_z {
        SignalAction::Buy
    } else if z_score > entry_z {
        SignalAction::Sell
    } else {
        SignalAction::Hold
    }
}

pub fn label_features(features: &[FeatureVector], entry_z: f64) -> Vec<SignalAction> {
    features.iter().map(|f| label_from_z_score(f.z_score, entry_z)).collect()
}

#[derive(Debug, Clone)]
pub struct SignalEnsemble {
    scaler: StandardScaler,
    /// Weighted by `PRIMARY_WEIGHT`
    primary: Box<dyn ProbabilisticPredictor>,
    /// Weighted by `SECONDARY_WEIGHT`
    secondary: Box<dyn ProbabilisticPredictor>,
    trained: bool,
}

impl SignalEnsemble {
    pub fn new(
        primary: Box<dyn ProbabilisticPredictor>, secondary: Box<dyn ProbabilisticPredictor>,
    ) -> Self {
        Self { scaler: StandardScaler::new(), primary, secondary, trained: false }
    }

    /// Random forest in the primary slot, gradient boosting in the secondary slot.
    pub fn from_config(cfg: &EnsembleConfig) -> Self {
        Self::new(
            Box::new(RandomForest::with_params(cfg.random_forest)),
            Box::new(GradientBoosting::with_params(cfg.gradient_boosting)),
        )
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Train on feature vectors and their labels.
    pub fn train(&mut self, features: &[FeatureVector], labels: &[SignalAction]) -> Result<()> {
        let rows: Vec<Vec<f64>> = features.iter().map(|f| f.to_row().to_vec()).collect();
        self.train_rows(&rows, labels)
    }

    /// Train on a raw row-major matrix. The scaler is fitted first on the full matrix,
    /// then each predictor independently on the scaled rows.
    pub fn train_rows(&mut self, rows: &[Vec<f64>], labels: &[SignalAction]) -> Result<()> {
        self.trained = false;
        validate_training(rows, labels)?;

        self.scaler.fit(rows)?;
        let scaled = self.scaler.transform_all(rows)?;
        self.primary.fit(&scaled, labels)?;
        self.secondary.fit(&scaled, labels)?;
        self.trained = true;

        let mut counts = [0usize; N_CLASSES];
        for l in labels {
            counts[l.class_index()] += 1;
        }
        info!(
            "Ensemble trained on {} rows (sell={}, buy={}, hold={}) with {} + {}",
            rows.len(),
            counts[SignalAction::Sell.class_index()],
            counts[SignalAction::Buy.class_index()],
            counts[SignalAction::Hold.class_index()],
            self.primary.name(),
            self.secondary.name()
        );
        Ok(())
    }

    /// Fused class distribution for one feature vector.
    pub fn fused_proba(&self, features: &FeatureVector) -> Result<[f64; N_CLASSES]> {
        self.fused_proba_row(&features.to_row())
    }

    pub fn fused_proba_row(&self, row: &[f64]) -> Result<[f64; N_CLASSES]> {
        if !self.trained {
            return Err(Error::ModelNotTrained);
        }
        let scaled = self.scaler.transform(row)?;
        let p_primary = self.primary.predict_proba(&scaled)?;
        let p_secondary = self.secondary.predict_proba(&scaled)?;
        Ok(fuse(&p_primary, &p_secondary))
    }

    /// Evaluate one validated feature vector into a trade signal.
    pub fn evaluate(&self, features: &FeatureVector) -> Result<Signal> {
        let fused = self.fused_proba(features)?;
        let signal = decide(&fused);
        debug!(
            "z={:.3} fused=[sell {:.3}, buy {:.3}, hold {:.3}] -> {} ({:.3})",
            features.z_score, fused[0], fused[1], fused[2], signal.action, signal.confidence
        );
        Ok(signal)
    }
}

impl Default for SignalEnsemble {
    fn default() -> Self {
        Self::from_config(&EnsembleConfig::default())
    }
}
