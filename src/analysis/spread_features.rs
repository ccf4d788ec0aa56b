//! Spread feature construction for a pair of time-aligned price series.
//!
//! Each emitted [`FeatureVector`] describes one time step of the pair: the raw spread,
//! its rolling mean / standard deviation and z-score, the RSI of both legs and the ratio
//! of their secondary (volume) rolling means. Steps whose rolling windows are not yet
//! populated are dropped (warm-up), as are steps whose z-score or volume ratio would
//! divide by zero.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::FeatureConfig;
use crate::indicators::{rolling_mean, rolling_mean_std, rsi};
use crate::utils::error::{Error, Result};
use crate::utils::types::PriceSeries;

/// Feature labels in model-input order.
pub const FEATURE_NAMES: [&str; 7] =
    ["spread", "spread_mean", "spread_std", "z_score", "rsi_a", "rsi_b", "volume_ratio"];

/// Number of features fed to the ensemble.
pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// Per-step feature set for one pair. All values are finite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    pub timestamp: DateTime<Utc>,
    pub spread: f64,
    pub spread_mean: f64,
    pub spread_std: f64,
    pub z_score: f64,
    pub rsi_a: f64,
    pub rsi_b: f64,
    pub volume_ratio: f64,
}

impl FeatureVector {
    /// Values ordered as [`FEATURE_NAMES`].
    pub fn to_row(&self) -> [f64; N_FEATURES] {
        [
            self.spread,
            self.spread_mean,
            self.spread_std,
            self.z_score,
            self.rsi_a,
            self.rsi_b,
            self.volume_ratio,
        ]
    }

    /// Look a feature up by label.
    pub fn get(&self, label: &str) -> Option<f64> {
        FEATURE_NAMES.iter().position(|n| *n == label).map(|i| self.to_row()[i])
    }

    /// Named mapping form handed to observability collaborators.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        FEATURE_NAMES.iter().copied().zip(self.to_row()).collect()
    }

    fn is_finite(&self) -> bool {
        self.to_row().iter().all(|v| v.is_finite())
    }
}

/// Builds [`FeatureVector`]s from two aligned series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadFeatureBuilder {
    lookback: usize,
    volume_window: usize,
}

impl Default for SpreadFeatureBuilder {
    fn default() -> Self {
        Self { lookback: 20, volume_window: 10 }
    }
}

impl SpreadFeatureBuilder {
    pub fn new(lookback: usize, volume_window: usize) -> Result<Self> {
        if lookback < 2 {
            return Err(Error::ConfigError(format!("lookback must be >= 2, got {}", lookback)));
        }
        if volume_window == 0 || volume_window > lookback {
            return Err(Error::ConfigError(format!(
                "volume_window must be in [1, {}], got {}",
                lookback, volume_window
            )));
        }
        Ok(Self { lookback, volume_window })
    }

    pub fn from_config(cfg: &FeatureConfig) -> Result<Self> {
        Self::new(cfg.lookback, cfg.volume_window)
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Compute one feature vector per fully warmed-up, non-degenerate step.
    pub fn build(&self, a: &PriceSeries, b: &PriceSeries) -> Result<Vec<FeatureVector>> {
        self.validate(a, b)?;

        let prices_a = a.prices();
        let prices_b = b.prices();
        let spread: Vec<f64> = prices_a.iter().zip(&prices_b).map(|(pa, pb)| pa - pb).collect();

        let spread_stats = rolling_mean_std(&spread, self.lookback);
        let rsi_a = rsi(&prices_a, self.lookback)?;
        let rsi_b = rsi(&prices_b, self.lookback)?;
        let vol_a = rolling_mean(&a.secondary(), self.volume_window);
        let vol_b = rolling_mean(&b.secondary(), self.volume_window);

        let mut out = Vec::with_capacity(spread.len().saturating_sub(self.lookback - 1));
        let mut dropped = 0usize;
        for t in (self.lookback - 1)..spread.len() {
            let (Some((mean, std)), Some(va), Some(vb)) = (spread_stats[t], vol_a[t], vol_b[t])
            else {
                dropped += 1;
                continue;
            };
            if std == 0.0 || vb == 0.0 {
                dropped += 1;
                continue;
            }
            let fv = FeatureVector {
                timestamp: a.points()[t].timestamp,
                spread: spread[t],
                spread_mean: mean,
                spread_std: std,
                z_score: (spread[t] - mean) / std,
                rsi_a: rsi_a[t],
                rsi_b: rsi_b[t],
                volume_ratio: va / vb,
            };
            if fv.is_finite() {
                out.push(fv);
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            debug!(
                "{}/{}: dropped {} degenerate steps after warm-up",
                a.symbol, b.symbol, dropped
            );
        }
        Ok(out)
    }

    /// Most recent valid feature vector, if any step survived.
    pub fn latest(&self, a: &PriceSeries, b: &PriceSeries) -> Result<Option<FeatureVector>> {
        Ok(self.build(a, b)?.pop())
    }

    fn validate(&self, a: &PriceSeries, b: &PriceSeries) -> Result<()> {
        if a.len() != b.len() {
            return Err(Error::data(format!(
                "series length mismatch: {} has {} points, {} has {}",
                a.symbol,
                a.len(),
                b.symbol,
                b.len()
            )));
        }
        if a.len() < self.lookback {
            return Err(Error::data(format!(
                "{}/{} has {} points, lookback requires {}",
                a.symbol,
                b.symbol,
                a.len(),
                self.lookback
            )));
        }
        if !a.is_aligned_with(b) {
            return Err(Error::data(format!("{} and {} are not time-aligned", a.symbol, b.symbol)));
        }
        let malformed = a
            .points()
            .iter()
            .chain(b.points())
            .any(|p| !p.price.is_finite() || !p.secondary().is_finite());
        if malformed {
            return Err(Error::data(format!(
                "{}/{} contains non-finite samples",
                a.symbol, b.symbol
            )));
        }
        Ok(())
    }
}
