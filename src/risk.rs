//! Position sizing and portfolio-level risk gates.
//!
//! [`RiskEngine`] owns the only cross-cycle state of the core ([`RiskState`]). It is
//! mutated exclusively through [`RiskEngine::apply`] with discrete, ordered
//! [`RiskEvent`]s; sizing and gate evaluation only read it.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::utils::error::{Error, Result};
use crate::utils::types::{AssetPair, Signal, SignalAction};

pub mod position_sizer;

pub use position_sizer::{kelly_fraction, KellySizer, TradeStats};

/// Fraction of current capital risked by a full-confidence signal at zero volatility.
pub const BASE_RISK_FRACTION: f64 = 0.02;
/// Upper bound on the confidence multiplier.
pub const MAX_SIGNAL_MULTIPLIER: f64 = 1.5;
/// Hard cap on a single trade as a fraction of current capital.
pub const MAX_TRADE_FRACTION: f64 = 0.05;

/// Capital and exposure tracked across evaluation cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub initial_capital: f64,
    pub current_capital: f64,
    pub daily_loss_limit_fraction: f64,
    pub max_drawdown_fraction: f64,
    /// Largest share of current capital a single open position may hold
    pub max_position_fraction: f64,
    /// Open notional per pair, keyed by the pair's display form (e.g. "WETH/WBTC")
    pub open_position_sizes: BTreeMap<String, f64>,
    /// Realised PnL since the last day rollover
    pub realized_pnl: f64,
    pub trade_stats: TradeStats,
}

impl RiskState {
    pub fn new(
        initial_capital: f64, daily_loss_limit_fraction: f64, max_drawdown_fraction: f64,
        max_position_fraction: f64,
    ) -> Result<Self> {
        if !(initial_capital.is_finite() && initial_capital > 0.0) {
            return Err(Error::ConfigError(format!(
                "initial capital must be positive, got {}",
                initial_capital
            )));
        }
        for (name, value) in [
            ("daily_loss_limit_fraction", daily_loss_limit_fraction),
            ("max_drawdown_fraction", max_drawdown_fraction),
            ("max_position_fraction", max_position_fraction),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(Error::ConfigError(format!("{} must be in (0, 1), got {}", name, value)));
            }
        }
        Ok(Self {
            initial_capital,
            current_capital: initial_capital,
            daily_loss_limit_fraction,
            max_drawdown_fraction,
            max_position_fraction,
            open_position_sizes: BTreeMap::new(),
            realized_pnl: 0.0,
            trade_stats: TradeStats::default(),
        })
    }

    pub fn from_config(cfg: &RiskConfig) -> Result<Self> {
        Self::new(
            cfg.initial_capital,
            cfg.daily_loss_limit_fraction,
            cfg.max_drawdown_fraction,
            cfg.max_position_fraction,
        )
    }

    fn book_pnl(&mut self, pnl: f64) {
        self.current_capital = (self.current_capital + pnl).max(0.0);
        self.realized_pnl += pnl;
        self.trade_stats.record(pnl);
    }
}

/// Ordered updates coming from the portfolio / execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RiskEvent {
    /// Authoritative capital and day PnL snapshot
    PortfolioRefresh { capital: f64, realized_pnl: f64 },
    /// A released order was (partially) filled
    TradeConfirmed { pair: AssetPair, filled_amount: f64, pnl: f64 },
    /// A position was closed out
    PositionClosed { pair: AssetPair, pnl: f64 },
    /// Start of a new trading day
    DayRollover,
}

/// Outcome of the three independent risk gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskChecks {
    pub daily_limit_ok: bool,
    pub drawdown_ok: bool,
    pub concentration_ok: bool,
}

impl RiskChecks {
    pub fn all_ok(&self) -> bool {
        self.daily_limit_ok && self.drawdown_ok && self.concentration_ok
    }

    /// Names of the gates that failed.
    pub fn failures(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.daily_limit_ok {
            out.push("daily_limit");
        }
        if !self.drawdown_ok {
            out.push("drawdown");
        }
        if !self.concentration_ok {
            out.push("concentration");
        }
        out
    }
}

/// Trade intent handed to the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizedOrder {
    pub pair: AssetPair,
    pub action: SignalAction,
    pub notional_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum OrderDecision {
    /// All gates passed; the order may be executed
    Release(SizedOrder),
    /// At least one gate failed
    Blocked { pair: AssetPair, action: SignalAction, checks: RiskChecks },
    /// Hold signal or zero size
    NoTrade { pair: AssetPair, signal: Signal },
}

impl OrderDecision {
    pub fn order(&self) -> Option<&SizedOrder> {
        match self {
            | OrderDecision::Release(order) => Some(order),
            | _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskEngine {
    state: RiskState,
    min_trades_for_kelly: u32,
}

impl RiskEngine {
    pub fn new(state: RiskState) -> Self {
        Self { state, min_trades_for_kelly: 20 }
    }

    pub fn from_config(cfg: &RiskConfig) -> Result<Self> {
        Ok(Self {
            state: RiskState::from_config(cfg)?,
            min_trades_for_kelly: cfg.min_trades_for_kelly,
        })
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    /// Notional for a signal of the given confidence under the given volatility.
    ///
    /// Shrinks as volatility rises and never exceeds 5% of current capital.
    pub fn position_size(&self, signal_confidence: f64, volatility: f64) -> Result<f64> {
        if !volatility.is_finite() || volatility < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "volatility must be a non-negative number, got {}",
                volatility
            )));
        }
        let capital = self.state.current_capital;
        let base = capital * BASE_RISK_FRACTION;
        let confidence = if signal_confidence.is_nan() { 0.0 } else { signal_confidence.max(0.0) };
        let signal_multiplier = confidence.min(MAX_SIGNAL_MULTIPLIER);
        let volatility_multiplier = 1.0 / (1.0 + volatility);
        let notional = base * signal_multiplier * volatility_multiplier;
        Ok(notional.min(capital * MAX_TRADE_FRACTION))
    }

    /// Evaluate the daily-loss, drawdown and concentration gates.
    pub fn check_risk_limits(&self, current_pnl: f64) -> RiskChecks {
        let s = &self.state;
        let daily_limit_ok = current_pnl > -s.daily_loss_limit_fraction * s.initial_capital;
        let drawdown_ok = s.current_capital / s.initial_capital > 1.0 - s.max_drawdown_fraction;
        let max_position = s.max_position_fraction * s.current_capital;
        let concentration_ok = s.open_position_sizes.values().all(|size| size.abs() <= max_position);
        RiskChecks { daily_limit_ok, drawdown_ok, concentration_ok }
    }

    /// Gates evaluated against the day's realised PnL held in [`RiskState`].
    pub fn current_checks(&self) -> RiskChecks {
        self.check_risk_limits(self.state.realized_pnl)
    }

    /// Turn a signal into an order decision. Orders are only released when every gate
    /// passes; blocked trades are reported, never silently dropped.
    pub fn size_order(
        &self, pair: &AssetPair, signal: &Signal, volatility: f64,
    ) -> Result<OrderDecision> {
        if !signal.is_actionable() {
            return Ok(OrderDecision::NoTrade { pair: pair.clone(), signal: *signal });
        }
        let notional = self
            .position_size(signal.confidence, volatility)?
            .min(self.state.current_capital);

        let checks = self.current_checks();
        if !checks.all_ok() {
            warn!("{} {} blocked by risk gates: {:?}", pair, signal.action, checks.failures());
            return Ok(OrderDecision::Blocked { pair: pair.clone(), action: signal.action, checks });
        }
        if notional <= 0.0 {
            return Ok(OrderDecision::NoTrade { pair: pair.clone(), signal: *signal });
        }

        debug!("{} {} sized at {:.2} (vol {:.4})", pair, signal.action, notional, volatility);
        Ok(OrderDecision::Release(SizedOrder {
            pair: pair.clone(),
            action: signal.action,
            notional_amount: notional,
        }))
    }

    /// Advisory Kelly fraction once enough trade outcomes have been recorded.
    pub fn kelly_hint(&self) -> Option<f64> {
        let stats = &self.state.trade_stats;
        if stats.total_trades() < self.min_trades_for_kelly {
            return None;
        }
        Some(KellySizer::from_stats(stats).fraction())
    }

    /// Apply one portfolio or execution event. This is the only mutation path.
    pub fn apply(&mut self, event: RiskEvent) -> Result<()> {
        match event {
            | RiskEvent::PortfolioRefresh { capital, realized_pnl } => {
                if !capital.is_finite() || capital < 0.0 || !realized_pnl.is_finite() {
                    return Err(Error::InvalidArgument(format!(
                        "invalid portfolio refresh: capital={} pnl={}",
                        capital, realized_pnl
                    )));
                }
                self.state.current_capital = capital;
                self.state.realized_pnl = realized_pnl;
            }
            | RiskEvent::TradeConfirmed { pair, filled_amount, pnl } => {
                if !filled_amount.is_finite() || filled_amount < 0.0 || !pnl.is_finite() {
                    return Err(Error::InvalidArgument(format!(
                        "invalid confirmation for {}: filled={} pnl={}",
                        pair, filled_amount, pnl
                    )));
                }
                *self.state.open_position_sizes.entry(pair.to_string()).or_insert(0.0) +=
                    filled_amount;
                self.state.book_pnl(pnl);
                info!("{} filled {:.2}, pnl {:.2}", pair, filled_amount, pnl);
            }
            | RiskEvent::PositionClosed { pair, pnl } => {
                if !pnl.is_finite() {
                    return Err(Error::InvalidArgument(format!("invalid pnl for {}: {}", pair, pnl)));
                }
                self.state.open_position_sizes.remove(&pair.to_string());
                self.state.book_pnl(pnl);
                info!("{} closed, pnl {:.2}", pair, pnl);
            }
            | RiskEvent::DayRollover => {
                self.state.realized_pnl = 0.0;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn engine() -> RiskEngine {
        RiskEngine::new(RiskState::new(10_000.0, 0.03, 0.15, 0.2).unwrap())
    }

    fn pair() -> AssetPair {
        AssetPair::new("WETH", "WBTC")
    }

    #[test]
    fn position_size_formula() {
        let e = engine();
        assert!((e.position_size(1.0, 0.0).unwrap() - 200.0).abs() < 1e-9);
        assert!((e.position_size(0.95, 0.5).unwrap() - 200.0 * 0.95 / 1.5).abs() < 1e-9);
        // multiplier saturates at 1.5
        assert!((e.position_size(5.0, 0.0).unwrap() - 300.0).abs() < 1e-9);
        assert_eq!(e.position_size(-1.0, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn position_size_is_capped_and_monotone_in_volatility() {
        let e = engine();
        for confidence in [0.0, 0.5, 0.91, 1.0, 1.5, 10.0] {
            let mut previous = f64::INFINITY;
            for step in 0..50 {
                let size = e.position_size(confidence, step as f64 * 0.1).unwrap();
                assert!(size <= 0.05 * 10_000.0);
                assert!(size <= previous);
                previous = size;
            }
        }
    }

    #[test]
    fn negative_volatility_fails_fast() {
        assert_matches!(engine().position_size(0.9, -0.01), Err(Error::InvalidArgument(_)));
        assert_matches!(engine().position_size(0.9, f64::NAN), Err(Error::InvalidArgument(_)));
    }

    #[rstest]
    #[case(-300.0, false)]
    #[case(-299.99, true)]
    #[case(-250.0, true)]
    #[case(0.0, true)]
    #[case(-1_000.0, false)]
    fn daily_limit_boundary(#[case] pnl: f64, #[case] ok: bool) {
        assert_eq!(engine().check_risk_limits(pnl).daily_limit_ok, ok);
    }

    #[test]
    fn drawdown_gate_tracks_capital() {
        let mut e = engine();
        e.apply(RiskEvent::PortfolioRefresh { capital: 8_600.0, realized_pnl: 0.0 }).unwrap();
        assert!(e.check_risk_limits(0.0).drawdown_ok);
        e.apply(RiskEvent::PortfolioRefresh { capital: 8_400.0, realized_pnl: 0.0 }).unwrap();
        let checks = e.check_risk_limits(0.0);
        assert!(!checks.drawdown_ok);
        assert_eq!(checks.failures(), vec!["drawdown"]);
    }

    #[test]
    fn concentration_gate() {
        let mut e = engine();
        assert!(e.check_risk_limits(0.0).concentration_ok);
        e.apply(RiskEvent::TradeConfirmed { pair: pair(), filled_amount: 2_000.0, pnl: 0.0 })
            .unwrap();
        assert!(e.check_risk_limits(0.0).concentration_ok);
        e.apply(RiskEvent::TradeConfirmed { pair: pair(), filled_amount: 500.0, pnl: 0.0 })
            .unwrap();
        assert!(!e.check_risk_limits(0.0).concentration_ok);
        e.apply(RiskEvent::PositionClosed { pair: pair(), pnl: 50.0 }).unwrap();
        assert!(e.check_risk_limits(0.0).concentration_ok);
        assert!((e.state().current_capital - 10_050.0).abs() < 1e-9);
    }

    #[test]
    fn size_order_releases_only_when_all_gates_pass() {
        let e = engine();
        let buy = Signal::new(SignalAction::Buy, 0.95);
        let decision = e.size_order(&pair(), &buy, 0.02).unwrap();
        let order = decision.order().expect("order should be released");
        assert_eq!(order.action, SignalAction::Buy);
        assert!(order.notional_amount > 0.0 && order.notional_amount <= 500.0);

        let hold = e.size_order(&pair(), &Signal::hold(0.99), 0.02).unwrap();
        assert_matches!(hold, OrderDecision::NoTrade { .. });
    }

    #[test]
    fn refreshed_day_loss_blocks_orders() {
        let mut e = engine();
        let buy = Signal::new(SignalAction::Buy, 0.95);
        e.apply(RiskEvent::PortfolioRefresh { capital: 10_000.0, realized_pnl: -300.0 }).unwrap();
        assert!(!e.current_checks().daily_limit_ok);
        assert_matches!(
            e.size_order(&pair(), &buy, 0.02).unwrap(),
            OrderDecision::Blocked { checks: RiskChecks { daily_limit_ok: false, .. }, .. }
        );

        e.apply(RiskEvent::PortfolioRefresh { capital: 10_000.0, realized_pnl: -299.99 }).unwrap();
        assert_matches!(e.size_order(&pair(), &buy, 0.02).unwrap(), OrderDecision::Release(_));

        // confirmed losses accumulate into the same figure
        e.apply(RiskEvent::TradeConfirmed { pair: pair(), filled_amount: 100.0, pnl: -0.02 })
            .unwrap();
        assert_matches!(e.size_order(&pair(), &buy, 0.02).unwrap(), OrderDecision::Blocked { .. });

        e.apply(RiskEvent::DayRollover).unwrap();
        assert_matches!(e.size_order(&pair(), &buy, 0.02).unwrap(), OrderDecision::Release(_));
    }

    #[test]
    fn events_update_state_in_order() {
        let mut e = engine();
        e.apply(RiskEvent::TradeConfirmed { pair: pair(), filled_amount: 100.0, pnl: -40.0 })
            .unwrap();
        assert!((e.state().realized_pnl + 40.0).abs() < 1e-12);
        assert!((e.state().current_capital - 9_960.0).abs() < 1e-9);
        e.apply(RiskEvent::DayRollover).unwrap();
        assert_eq!(e.state().realized_pnl, 0.0);
        e.apply(RiskEvent::PositionClosed { pair: pair(), pnl: -1e9 }).unwrap();
        assert_eq!(e.state().current_capital, 0.0);

        assert_matches!(
            e.apply(RiskEvent::PortfolioRefresh { capital: -1.0, realized_pnl: 0.0 }),
            Err(Error::InvalidArgument(_))
        );
        assert_matches!(
            e.apply(RiskEvent::TradeConfirmed { pair: pair(), filled_amount: -5.0, pnl: 0.0 }),
            Err(Error::InvalidArgument(_))
        );
    }

    #[test]
    fn kelly_hint_needs_history() {
        let mut e = engine();
        assert_eq!(e.kelly_hint(), None);
        for i in 0..20 {
            let pnl = if i % 4 == 0 { -10.0 } else { 20.0 };
            e.apply(RiskEvent::PositionClosed { pair: pair(), pnl }).unwrap();
        }
        let hint = e.kelly_hint().unwrap();
        assert!(hint > 0.0 && hint <= 0.1);
    }

    #[rstest]
    #[case(0.0, 0.03, 0.15, 0.2)]
    #[case(10_000.0, 0.0, 0.15, 0.2)]
    #[case(10_000.0, 0.03, 1.0, 0.2)]
    #[case(10_000.0, 0.03, 0.15, f64::NAN)]
    fn invalid_state_is_rejected(
        #[case] capital: f64, #[case] daily: f64, #[case] drawdown: f64, #[case] position: f64,
    ) {
        assert_matches!(
            RiskState::new(capital, daily, drawdown, position),
            Err(Error::ConfigError(_))
        );
    }
}
