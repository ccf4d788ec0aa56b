//! Evaluation engine: wires pair selection, feature construction, the signal ensemble
//! and the risk engine into one synchronous cycle.
//!
//! A cycle reads the universe and the trained models, and produces a [`CycleReport`].
//! Risk state only changes between cycles, through [`StatArbEngine::apply`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::{FeatureVector, PairCandidate, PairSelector, SpreadFeatureBuilder};
use crate::config::Config;
use crate::indicators::realized_volatility;
use crate::risk::{OrderDecision, RiskChecks, RiskEngine, RiskEvent, SizedOrder};
use crate::signal::{rank_opportunities, ScoredSignal};
use crate::strategy::{label_features, SignalEnsemble};
use crate::utils::error::{Error, Result};
use crate::utils::types::{AssetPair, PriceSeries, Signal};

/// Source tag used for signals produced by [`StatArbEngine::evaluate_cycle`].
pub const ENGINE_SOURCE: &str = "stat_arb";

/// Outcome for one candidate pair in a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairEvaluation {
    pub pair: AssetPair,
    pub relatedness_score: f64,
    pub features: FeatureVector,
    /// Realised volatility of the first leg over the feature lookback
    pub volatility: f64,
    pub signal: Signal,
    pub decision: OrderDecision,
}

/// Everything a cycle decided, in a form suitable for logging or shipping as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub candidates: Vec<PairCandidate>,
    pub evaluations: Vec<PairEvaluation>,
    /// Candidates for which no feature step survived
    pub skipped: Vec<AssetPair>,
    pub risk_checks: RiskChecks,
    pub capital: f64,
    pub kelly_hint: Option<f64>,
}

impl CycleReport {
    /// Orders released by the risk engine this cycle.
    pub fn orders(&self) -> Vec<&SizedOrder> {
        self.evaluations.iter().filter_map(|e| e.decision.order()).collect()
    }

    /// Actionable signals of this cycle, best first.
    pub fn opportunities(&self, n: usize) -> Vec<ScoredSignal> {
        let scored: Vec<ScoredSignal> = self
            .evaluations
            .iter()
            .map(|e| ScoredSignal::new(ENGINE_SOURCE, e.pair.clone(), e.signal))
            .collect();
        rank_opportunities(&[scored], n)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct StatArbEngine {
    config: Config,
    selector: PairSelector,
    features: SpreadFeatureBuilder,
    ensemble: SignalEnsemble,
    risk: RiskEngine,
}

impl StatArbEngine {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let selector = PairSelector::new(config.pairs.n_pairs);
        let features = SpreadFeatureBuilder::from_config(&config.features)?;
        let ensemble = SignalEnsemble::from_config(&config.ensemble);
        let risk = RiskEngine::from_config(&config.risk)?;
        Ok(Self { config, selector, features, ensemble, risk })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ensemble(&self) -> &SignalEnsemble {
        &self.ensemble
    }

    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    /// Top correlated pairs of the universe.
    pub fn scan(&self, universe: &[PriceSeries]) -> Result<Vec<PairCandidate>> {
        self.selector.select(universe)
    }

    /// Build and label features for every training pair, then train the ensemble.
    /// Returns the number of training rows.
    pub fn train(&mut self, pairs_data: &[(PriceSeries, PriceSeries)]) -> Result<usize> {
        let mut features = Vec::new();
        for (a, b) in pairs_data {
            let built = self.features.build(a, b)?;
            debug!("{}/{}: {} training steps", a.symbol, b.symbol, built.len());
            features.extend(built);
        }
        let labels = label_features(&features, self.config.ensemble.entry_z);
        self.ensemble.train(&features, &labels)?;
        Ok(features.len())
    }

    /// Run one evaluation over the universe. The daily-loss gate reads the day's realised
    /// PnL from the risk state, as last updated through [`StatArbEngine::apply`].
    pub fn evaluate_cycle(&self, universe: &[PriceSeries]) -> Result<CycleReport> {
        if !self.ensemble.is_trained() {
            return Err(Error::ModelNotTrained);
        }
        let by_symbol: HashMap<&str, &PriceSeries> =
            universe.iter().map(|s| (s.symbol.as_str(), s)).collect();
        let candidates = self.scan(universe)?;

        let mut evaluations = Vec::with_capacity(candidates.len());
        let mut skipped = Vec::new();
        for candidate in &candidates {
            let pair = candidate.pair();
            let (Some(a), Some(b)) = (
                by_symbol.get(candidate.asset_a.as_str()),
                by_symbol.get(candidate.asset_b.as_str()),
            ) else {
                return Err(Error::data(format!("{} is not in the universe", pair)));
            };

            let Some(features) = self.features.latest(a, b)? else {
                warn!("{}: no valid feature step, skipping", pair);
                skipped.push(pair);
                continue;
            };
            let volatility = leg_volatility(&a.prices(), self.features.lookback())?;
            let signal = self.ensemble.evaluate(&features)?;
            let decision = self.risk.size_order(&pair, &signal, volatility)?;

            debug!(
                "{}: corr {:.3} z {:.3} vol {:.4} -> {} ({:.3})",
                pair,
                candidate.relatedness_score,
                features.z_score,
                volatility,
                signal.action,
                signal.confidence
            );
            evaluations.push(PairEvaluation {
                pair,
                relatedness_score: candidate.relatedness_score,
                features,
                volatility,
                signal,
                decision,
            });
        }

        let report = CycleReport {
            timestamp: Utc::now(),
            candidates,
            evaluations,
            skipped,
            risk_checks: self.risk.current_checks(),
            capital: self.risk.state().current_capital,
            kelly_hint: self.risk.kelly_hint(),
        };
        info!(
            "Cycle: {} candidates, {} evaluated, {} orders released, capital {:.2}",
            report.candidates.len(),
            report.evaluations.len(),
            report.orders().len(),
            report.capital
        );
        Ok(report)
    }

    /// Forward a portfolio or execution event to the risk engine.
    pub fn apply(&mut self, event: RiskEvent) -> Result<()> {
        self.risk.apply(event)
    }
}

/// Realised volatility of one leg over at most `lookback` returns. A series of exactly
/// `lookback` points has one return fewer than the window, so the window shrinks to fit.
fn leg_volatility(prices: &[f64], lookback: usize) -> Result<f64> {
    let window = lookback.min(prices.len().saturating_sub(1));
    realized_volatility(prices, window)
}
