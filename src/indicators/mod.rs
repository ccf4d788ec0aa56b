//! Rolling-window statistics and technical indicators shared by the pair selector and
//! the spread feature builder.
//!
//! Moments come from `statrs`, RSI from the `ta` crate. Every rolling helper returns one
//! entry per input sample; entries whose window is not yet fully populated are `None`.

use statrs::statistics::Statistics;
use ta::indicators::RelativeStrengthIndex;
use ta::Next;

use crate::utils::error::{Error, Result};

/// Rolling arithmetic mean over the trailing `window` values.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| w.iter().mean())
}

/// Rolling mean and sample standard deviation (n - 1 denominator).
pub fn rolling_mean_std(values: &[f64], window: usize) -> Vec<Option<(f64, f64)>> {
    rolling(values, window, |w| (w.iter().mean(), w.iter().std_dev()))
}

fn rolling<T, F>(values: &[f64], window: usize, f: F) -> Vec<Option<T>>
where
    F: Fn(&[f64]) -> T,
{
    if window == 0 {
        return values.iter().map(|_| None).collect();
    }
    (0..values.len())
        .map(|t| {
            if t + 1 < window {
                None
            } else {
                Some(f(&values[t + 1 - window..=t]))
            }
        })
        .collect()
}

/// Relative strength index of `prices` with the given period, one value per sample.
/// Output is bounded to [0, 100].
pub fn rsi(prices: &[f64], period: usize) -> Result<Vec<f64>> {
    let mut indicator = RelativeStrengthIndex::new(period)
        .map_err(|e| Error::ConfigError(format!("invalid RSI period {}: {:?}", period, e)))?;
    Ok(prices.iter().map(|&p| indicator.next(p).clamp(0.0, 100.0)).collect())
}

/// Pearson correlation of two equally long samples. `None` when undefined
/// (fewer than two points, zero variance, or non-finite input).
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let sd_a = a.iter().std_dev();
    let sd_b = b.iter().std_dev();
    let cov = a.iter().covariance(b.iter());
    let r = cov / (sd_a * sd_b);
    if r.is_finite() && sd_a > 0.0 && sd_b > 0.0 {
        Some(r.clamp(-1.0, 1.0))
    } else {
        None
    }
}

/// Simple returns `p[t] / p[t-1] - 1`.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Sample standard deviation of the last `window` simple returns.
pub fn realized_volatility(prices: &[f64], window: usize) -> Result<f64> {
    if window < 2 {
        return Err(Error::ConfigError(format!("volatility window must be >= 2, got {}", window)));
    }
    if prices.len() < window + 1 {
        return Err(Error::data(format!(
            "need {} prices for a {}-return volatility estimate, got {}",
            window + 1,
            window,
            prices.len()
        )));
    }
    let tail = &prices[prices.len() - window - 1..];
    if tail.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Err(Error::data("volatility requires strictly positive finite prices"));
    }
    let vol = simple_returns(tail).iter().std_dev();
    if vol.is_finite() {
        Ok(vol)
    } else {
        Err(Error::data("volatility estimate is not finite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rolling_mean_warms_up() {
        let out = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!(close(out[2].unwrap(), 2.0));
        assert!(close(out[3].unwrap(), 3.0));
    }

    #[test]
    fn rolling_std_is_sample_std() {
        let out = rolling_mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        let (mean, std) = out[7].unwrap();
        assert!(close(mean, 5.0));
        // population std is 2.0, sample std is sqrt(32/7)
        assert!(close(std, (32.0f64 / 7.0).sqrt()));
    }

    #[test]
    fn rsi_is_bounded() {
        let up: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let down: Vec<f64> = (0..50).map(|i| 100.0 - i as f64 * 0.5).collect();
        for v in rsi(&up, 14).unwrap().into_iter().chain(rsi(&down, 14).unwrap()) {
            assert!((0.0..=100.0).contains(&v));
        }
        assert!(*rsi(&up, 14).unwrap().last().unwrap() > 90.0);
        assert!(*rsi(&down, 14).unwrap().last().unwrap() < 10.0);
        assert!(rsi(&up, 0).is_err());
    }

    #[test]
    fn correlation_edge_cases() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        let c = [4.0, 3.0, 2.0, 1.0];
        assert!(close(pearson_correlation(&a, &b).unwrap(), 1.0));
        assert!(close(pearson_correlation(&a, &c).unwrap(), -1.0));
        assert_eq!(pearson_correlation(&a, &[1.0, 1.0, 1.0, 1.0]), None);
        assert_eq!(pearson_correlation(&a, &b[..3]), None);
        assert_eq!(pearson_correlation(&[1.0], &[2.0]), None);
    }

    #[test]
    fn volatility_of_flat_series_is_zero() {
        let flat = vec![100.0; 30];
        assert!(close(realized_volatility(&flat, 20).unwrap(), 0.0));
        assert!(realized_volatility(&flat[..10], 20).is_err());
        assert!(realized_volatility(&[1.0, 0.0, 1.0, 2.0], 2).is_err());
    }
}
