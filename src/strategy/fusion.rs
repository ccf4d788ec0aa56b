//! Fixed-weight probability fusion and the high-confidence decision rule.
//!
//! The weights and the gate are design constants, not learned parameters.

use crate::utils::types::{Signal, SignalAction, N_CLASSES};

/// Weight of the primary (bagged-tree) predictor.
pub const PRIMARY_WEIGHT: f64 = 0.6;
/// Weight of the secondary (boosted-tree) predictor.
pub const SECONDARY_WEIGHT: f64 = 0.4;
/// A buy or sell is only emitted when its fused probability is strictly above this.
pub const CONFIDENCE_GATE: f64 = 0.9;

/// Component-wise weighted average of two class distributions.
pub fn fuse(primary: &[f64], secondary: &[f64]) -> [f64; N_CLASSES] {
    let mut fused = [0.0; N_CLASSES];
    for (k, p) in fused.iter_mut().enumerate() {
        let a = primary.get(k).copied().unwrap_or(0.0);
        let b = secondary.get(k).copied().unwrap_or(0.0);
        *p = PRIMARY_WEIGHT * a + SECONDARY_WEIGHT * b;
    }
    fused
}

/// Map a fused distribution to a signal. Buy wins over sell when both clear the gate.
pub fn decide(fused: &[f64; N_CLASSES]) -> Signal {
    let buy = fused[SignalAction::Buy.class_index()];
    let sell = fused[SignalAction::Sell.class_index()];
    if buy > CONFIDENCE_GATE {
        Signal::new(SignalAction::Buy, buy)
    } else if sell > CONFIDENCE_GATE {
        Signal::new(SignalAction::Sell, sell)
    } else {
        let max = fused.iter().copied().fold(0.0, f64::max);
        Signal::hold(max)
    }
}
