//! Kelly Criterion sizing from historical trade outcomes.
//!
//! kelly_fraction = (b*p - q) / b where
//!   b = payoff ratio (avg win / avg loss)
//!   p = win rate, q = 1 - p
//! The raw fraction is quarter-Kelly dampened and capped at 10% of equity. The result is
//! advisory input to the risk engine, not an order size.

use serde::{Deserialize, Serialize};

/// Multiplier applied to the raw Kelly fraction.
pub const KELLY_DAMPENING: f64 = 0.25;
/// Hard upper bound on the dampened fraction.
pub const KELLY_CAP: f64 = 0.1;

/// Dampened, capped Kelly fraction in [0, 0.1].
///
/// `avg_loss` is a positive loss magnitude (as produced by [`TradeStats::avg_loss`]).
/// Zero means there is no loss history yet and, like a negative value, yields 0.
pub fn kelly_fraction(win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
    if !(avg_loss > 0.0) {
        return 0.0;
    }
    let b = avg_win / avg_loss;
    let edge = b * win_rate - (1.0 - win_rate);
    let raw = edge / b;
    let fraction = (raw * KELLY_DAMPENING).clamp(0.0, KELLY_CAP);
    if fraction.is_finite() {
        fraction
    } else {
        0.0
    }
}

/// Running win/loss statistics of confirmed trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub wins: u32,
    pub losses: u32,
    pub total_win: f64,
    /// Sum of loss magnitudes
    pub total_loss: f64,
}

impl TradeStats {
    /// Record a realised trade result. Flat results are ignored.
    pub fn record(&mut self, pnl: f64) {
        if pnl > 0.0 {
            self.wins += 1;
            self.total_win += pnl;
        } else if pnl < 0.0 {
            self.losses += 1;
            self.total_loss += -pnl;
        }
    }

    pub fn total_trades(&self) -> u32 {
        self.wins + self.losses
    }

    pub fn win_rate(&self) -> f64 {
        match self.total_trades() {
            | 0 => 0.0,
            | n => self.wins as f64 / n as f64,
        }
    }

    pub fn avg_win(&self) -> f64 {
        if self.wins == 0 {
            0.0
        } else {
            self.total_win / self.wins as f64
        }
    }

    pub fn avg_loss(&self) -> f64 {
        if self.losses == 0 {
            0.0
        } else {
            self.total_loss / self.losses as f64
        }
    }
}

/// Kelly sizer over static win/loss inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KellySizer {
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

impl KellySizer {
    pub fn new(win_rate: f64, avg_win: f64, avg_loss: f64) -> Self {
        Self { win_rate, avg_win, avg_loss }
    }

    pub fn from_stats(stats: &TradeStats) -> Self {
        Self::new(stats.win_rate(), stats.avg_win(), stats.avg_loss())
    }

    pub fn fraction(&self) -> f64 {
        kelly_fraction(self.win_rate, self.avg_win, self.avg_loss)
    }

    /// Advisory capital amount for the given equity.
    pub fn size(&self, equity: f64) -> f64 {
        equity.max(0.0) * self.fraction()
    }
}
