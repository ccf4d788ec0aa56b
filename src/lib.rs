//! # Stat-Arb Rust
//! Signal and risk core for statistical-arbitrage pair trading.
//!
//! Pipeline per evaluation cycle:
//! 1. [`analysis::PairSelector`] ranks correlated pairs of a price universe.
//! 2. [`analysis::SpreadFeatureBuilder`] turns each aligned pair into spread features.
//! 3. [`strategy::SignalEnsemble`] fuses a random forest and a gradient-boosting model
//!    and only emits a buy or sell above a fixed confidence gate.
//! 4. [`risk::RiskEngine`] sizes the trade and releases it only if every risk gate passes.
//!
//! [`engine::StatArbEngine`] drives the cycle and reports it as a [`engine::CycleReport`].

pub use crate::utils::error::{Error, Result};

pub mod analysis;
pub mod config;
pub mod engine;
pub mod indicators;
pub mod models;
pub mod risk;
pub mod signal;
pub mod strategy;
pub mod utils;
