//! Common types used throughout the signal and risk core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of decision classes produced by the probabilistic predictors.
pub const N_CLASSES: usize = 3;

/// One market-data sample for a single asset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    /// Secondary per-asset series (usually traded volume). Falls back to `price` when absent.
    #[serde(default)]
    pub volume: Option<f64>,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price, volume: None }
    }

    pub fn with_volume(timestamp: DateTime<Utc>, price: f64, volume: f64) -> Self {
        Self { timestamp, price, volume: Some(volume) }
    }

    /// Value of the secondary series used for volume ratios.
    pub fn secondary(&self) -> f64 {
        self.volume.unwrap_or(self.price)
    }
}

/// Ordered, append-only price history for one asset
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Create an empty series for `symbol`
    pub fn new(symbol: &str) -> Self {
        Self { symbol: symbol.to_uppercase(), points: Vec::new() }
    }

    /// Build a series from existing samples (assumed to be in time order)
    pub fn from_points(symbol: &str, points: Vec<PricePoint>) -> Self {
        Self { symbol: symbol.to_uppercase(), points }
    }

    /// Build a series from raw prices sampled at a fixed interval starting at `start`.
    pub fn from_prices(
        symbol: &str, start: DateTime<Utc>, step: chrono::Duration, prices: &[f64],
    ) -> Self {
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint::new(start + step * i as i32, p))
            .collect();
        Self::from_points(symbol, points)
    }

    pub fn push(&mut self, point: PricePoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn secondary(&self) -> Vec<f64> {
        self.points.iter().map(PricePoint::secondary).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when both series have the same length and identical timestamps at every index.
    pub fn is_aligned_with(&self, other: &PriceSeries) -> bool {
        self.len() == other.len()
            && self
                .points
                .iter()
                .zip(other.points.iter())
                .all(|(a, b)| a.timestamp == b.timestamp)
    }
}

/// Represents a pair of assets traded against each other (e.g. WETH/WBTC)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetPair {
    pub asset_a: String,
    pub asset_b: String,
}

impl AssetPair {
    pub fn new(asset_a: &str, asset_b: &str) -> Self {
        Self { asset_a: asset_a.to_uppercase(), asset_b: asset_b.to_uppercase() }
    }

    /// Parse a pair from a string (e.g., "WETH/WBTC")
    pub fn parse(s: &str) -> Option<Self> {
        let (a, b) = s.split_once('/')?;
        if a.is_empty() || b.is_empty() || b.contains('/') {
            return None;
        }
        Some(Self::new(a, b))
    }
}

impl std::fmt::Display for AssetPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.asset_a, self.asset_b)
    }
}

/// Trade direction emitted by the ensemble. Discriminants are the class indices
/// used by every probabilistic predictor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Sell = 0,
    Buy = 1,
    Hold = 2,
}

impl SignalAction {
    pub const ALL: [SignalAction; N_CLASSES] =
        [SignalAction::Sell, SignalAction::Buy, SignalAction::Hold];

    pub fn class_index(self) -> usize {
        self as usize
    }

    pub fn from_class_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            | SignalAction::Sell => "sell",
            | SignalAction::Buy => "buy",
            | SignalAction::Hold => "hold",
        };
        f.write_str(s)
    }
}

/// Decision produced by one evaluation. Never mutated after creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub action: SignalAction,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl Signal {
    pub fn new(action: SignalAction, confidence: f64) -> Self {
        Self { action, confidence: confidence.clamp(0.0, 1.0) }
    }

    pub fn hold(confidence: f64) -> Self {
        Self::new(SignalAction::Hold, confidence)
    }

    pub fn is_actionable(&self) -> bool {
        self.action != SignalAction::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn asset_pair_parse_and_display() {
        let pair = AssetPair::parse("weth/wbtc").unwrap();
        assert_eq!(pair, AssetPair::new("WETH", "WBTC"));
        assert_eq!(pair.to_string(), "WETH/WBTC");
        assert!(AssetPair::parse("WETH").is_none());
        assert!(AssetPair::parse("A/B/C").is_none());
        assert!(AssetPair::parse("/B").is_none());
    }

    #[test]
    fn class_indices_are_stable() {
        assert_eq!(SignalAction::Sell.class_index(), 0);
        assert_eq!(SignalAction::Buy.class_index(), 1);
        assert_eq!(SignalAction::Hold.class_index(), 2);
        assert_eq!(SignalAction::from_class_index(1), Some(SignalAction::Buy));
        assert_eq!(SignalAction::from_class_index(3), None);
    }

    #[test]
    fn series_alignment() {
        let step = chrono::Duration::minutes(1);
        let a = PriceSeries::from_prices("a", t0(), step, &[1.0, 2.0, 3.0]);
        let b = PriceSeries::from_prices("b", t0(), step, &[3.0, 2.0, 1.0]);
        let shifted = PriceSeries::from_prices("c", t0() + step, step, &[3.0, 2.0, 1.0]);
        let short = PriceSeries::from_prices("d", t0(), step, &[1.0, 2.0]);

        assert_eq!(a.symbol, "A");
        assert!(a.is_aligned_with(&b));
        assert!(!a.is_aligned_with(&shifted));
        assert!(!a.is_aligned_with(&short));
    }

    #[test]
    fn secondary_falls_back_to_price() {
        let mut s = PriceSeries::new("eth");
        s.push(PricePoint::new(t0(), 10.0));
        s.push(PricePoint::with_volume(t0(), 11.0, 500.0));
        assert_eq!(s.secondary(), vec![10.0, 500.0]);
    }

    #[test]
    fn signal_confidence_is_clamped_and_serialises_lowercase() {
        let s = Signal::new(SignalAction::Buy, 1.3);
        assert_eq!(s.confidence, 1.0);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"buy\""));
        assert!(!Signal::hold(0.5).is_actionable());
    }
}
