//! Utility functions and types shared across the core.

pub mod error;
mod logging;
pub mod types;

pub use error::Error;
pub use logging::{init_from_config, init_logging, init_test_logging};
pub use types::*;

/// Re-export of commonly used types
pub mod prelude {
    pub use super::{
        error::{Error, Result},
        logging::{init_from_config, init_logging},
        types::*,
    };
    pub use crate::analysis::{FeatureVector, PairCandidate, PairSelector, SpreadFeatureBuilder};
    pub use crate::config::Config;
    pub use crate::engine::{CycleReport, StatArbEngine};
    pub use crate::risk::{OrderDecision, RiskEngine, RiskEvent, SizedOrder};
    pub use crate::strategy::SignalEnsemble;
}
