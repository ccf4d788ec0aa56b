//! Market-data analysis: pair discovery and per-pair feature construction.

pub mod pair_selector;
pub mod spread_features;

pub use pair_selector::{PairCandidate, PairSelector, RELATEDNESS_THRESHOLD};
pub use spread_features::{FeatureVector, SpreadFeatureBuilder, FEATURE_NAMES, N_FEATURES};
