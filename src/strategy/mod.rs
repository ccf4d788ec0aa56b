//! Signal generation: the two-model ensemble and its fixed-weight fusion rule.

pub mod ensemble;
pub mod fusion;

pub use ensemble::{label_features, label_from_z_score, SignalEnsemble};
pub use fusion::{decide, fuse, CONFIDENCE_GATE, PRIMARY_WEIGHT, SECONDARY_WEIGHT};
