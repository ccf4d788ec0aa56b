//! Correlation-based pair discovery.
//!
//! This is a cheap, deterministic pre-filter: pairs are ranked by Pearson correlation of
//! their price levels. It is not a cointegration test; callers that need Engle-Granger or
//! Johansen style evidence must apply it to the returned candidates.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::indicators::pearson_correlation;
use crate::utils::error::{Error, Result};
use crate::utils::types::{AssetPair, PriceSeries};

/// Minimum correlation (exclusive) for a pair to be considered related.
pub const RELATEDNESS_THRESHOLD: f64 = 0.7;

/// A pair produced by one scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairCandidate {
    pub asset_a: String,
    pub asset_b: String,
    /// Pearson correlation in [-1, 1]
    pub relatedness_score: f64,
}

impl PairCandidate {
    pub fn pair(&self) -> AssetPair {
        AssetPair::new(&self.asset_a, &self.asset_b)
    }
}

/// Scans a universe of assets for highly correlated pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairSelector {
    n_pairs: usize,
}

impl PairSelector {
    pub fn new(n_pairs: usize) -> Self {
        Self { n_pairs }
    }

    pub fn n_pairs(&self) -> usize {
        self.n_pairs
    }

    /// Rank every unordered pair of distinct assets by correlation.
    ///
    /// `universe` order defines enumeration order and therefore the tie-break between
    /// equally correlated pairs.
    pub fn select(&self, universe: &[PriceSeries]) -> Result<Vec<PairCandidate>> {
        if let Some(first) = universe.first() {
            if let Some(bad) = universe.iter().find(|s| !s.is_aligned_with(first)) {
                return Err(Error::data(format!(
                    "universe is not aligned: {} ({} points) vs {} ({} points)",
                    first.symbol,
                    first.len(),
                    bad.symbol,
                    bad.len()
                )));
            }
        }

        let prices: Vec<Vec<f64>> = universe.iter().map(PriceSeries::prices).collect();
        let mut pairs = Vec::new();
        for i in 0..universe.len() {
            for j in (i + 1)..universe.len() {
                let Some(corr) = pearson_correlation(&prices[i], &prices[j]) else {
                    continue;
                };
                if corr > RELATEDNESS_THRESHOLD {
                    pairs.push(PairCandidate {
                        asset_a: universe[i].symbol.clone(),
                        asset_b: universe[j].symbol.clone(),
                        relatedness_score: corr,
                    });
                }
            }
        }

        // stable sort keeps enumeration order for equal scores
        pairs.sort_by(|x, y| y.relatedness_score.total_cmp(&x.relatedness_score));
        pairs.truncate(self.n_pairs);

        debug!("pair scan over {} assets selected {} pairs", universe.len(), pairs.len());
        Ok(pairs)
    }
}

impl Default for PairSelector {
    fn default() -> Self {
        Self::new(10)
    }
}
