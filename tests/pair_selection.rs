//! Pair discovery on a seeded synthetic universe and feature construction on the winner

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use statarb::analysis::{PairSelector, SpreadFeatureBuilder, RELATEDNESS_THRESHOLD};
use statarb::utils::types::PriceSeries;

const LEN: usize = 500;

fn series(symbol: &str, prices: &[f64]) -> PriceSeries {
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    PriceSeries::from_prices(symbol, t0, Duration::hours(1), prices)
}

/// Universe with one common-factor cluster, one inverse leg and one unrelated asset.
fn universe() -> Result<Vec<PriceSeries>> {
    let mut rng = StdRng::seed_from_u64(7);
    let step = Normal::new(0.0, 1.0)?;
    let noise = Normal::new(0.0, 0.2)?;

    let mut level = 1_000.0;
    let factor: Vec<f64> = (0..LEN)
        .map(|t| {
            level += step.sample(&mut rng);
            level + 0.1 * t as f64
        })
        .collect();

    let eth: Vec<f64> = factor.iter().map(|f| f + noise.sample(&mut rng)).collect();
    let steth: Vec<f64> = factor.iter().map(|f| 0.5 * f + 30.0 + noise.sample(&mut rng)).collect();
    let inverse: Vec<f64> = factor.iter().map(|f| 3_000.0 - f + noise.sample(&mut rng)).collect();
    let unrelated: Vec<f64> = (0..LEN).map(|_| 50.0 + noise.sample(&mut rng)).collect();

    Ok(vec![
        series("ETH", &eth),
        series("USDC", &unrelated),
        series("STETH", &steth),
        series("SHORT", &inverse),
    ])
}

#[test]
fn common_factor_pair_is_found() -> Result<()> {
    let universe = universe()?;
    let candidates = PairSelector::new(10).select(&universe)?;

    assert_eq!(candidates.len(), 1);
    let best = &candidates[0];
    assert_eq!((best.asset_a.as_str(), best.asset_b.as_str()), ("ETH", "STETH"));
    assert!(best.relatedness_score > 0.99);
    assert!(candidates.iter().all(|c| c.relatedness_score > RELATEDNESS_THRESHOLD));
    Ok(())
}

#[test]
fn selected_pair_yields_usable_features() -> Result<()> {
    let universe = universe()?;
    let candidates = PairSelector::default().select(&universe)?;
    let a = universe.iter().find(|s| s.symbol == candidates[0].asset_a).unwrap();
    let b = universe.iter().find(|s| s.symbol == candidates[0].asset_b).unwrap();

    let builder = SpreadFeatureBuilder::default();
    let features = builder.build(a, b)?;
    assert_eq!(features.len(), LEN - builder.lookback() + 1);
    for fv in &features {
        assert!(fv.spread_std > 0.0);
        assert!((0.0..=100.0).contains(&fv.rsi_a));
        assert!((0.0..=100.0).contains(&fv.rsi_b));
        assert!(fv.volume_ratio > 0.0);
    }
    let latest = builder.latest(a, b)?.unwrap();
    assert_eq!(latest, *features.last().unwrap());
    Ok(())
}
