//! Fan-in of scored signals from several evaluation sources.
//!
//! Each source (one ensemble run, one universe scan, ...) emits [`ScoredSignal`]s
//! independently; [`rank_opportunities`] merges them into a single ordered list of
//! trade candidates. Nothing here holds state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::types::{AssetPair, Signal};

/// A signal tagged with the pair it refers to and the source that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSignal {
    pub source: String,
    pub pair: AssetPair,
    pub signal: Signal,
}

impl ScoredSignal {
    pub fn new(source: impl Into<String>, pair: AssetPair, signal: Signal) -> Self {
        Self { source: source.into(), pair, signal }
    }

    pub fn confidence(&self) -> f64 {
        self.signal.confidence
    }
}

/// Merge signals from all sources and keep the best `n` actionable ones.
///
/// Hold signals are discarded. For a pair reported more than once the highest
/// confidence wins; on a tie the first one seen (source order, then position) is kept.
/// The result is sorted by descending confidence with ties in first-seen order.
pub fn rank_opportunities(sources: &[Vec<ScoredSignal>], n: usize) -> Vec<ScoredSignal> {
    let mut best: Vec<ScoredSignal> = Vec::new();
    let mut slot: HashMap<AssetPair, usize> = HashMap::new();

    for scored in sources.iter().flatten() {
        if !scored.signal.is_actionable() {
            continue;
        }
        match slot.get(&scored.pair) {
            | Some(&i) => {
                if scored.confidence() > best[i].confidence() {
                    best[i] = scored.clone();
                }
            }
            | None => {
                slot.insert(scored.pair.clone(), best.len());
                best.push(scored.clone());
            }
        }
    }

    best.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
    best.truncate(n);
    best
}
