//! Configuration module for the stat-arb core

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{GradientBoostingParams, RandomForestParams};
use crate::utils::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,

    /// Spread feature construction
    #[serde(default)]
    pub features: FeatureConfig,

    /// Pair selection
    #[serde(default)]
    pub pairs: PairConfig,

    /// Signal ensemble models and labelling
    #[serde(default)]
    pub ensemble: EnsembleConfig,

    /// Risk limits and capital
    #[serde(default)]
    pub risk: RiskConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level used by `init_from_config` (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Rolling window for spread statistics and RSI
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    /// Rolling window for the volume ratio
    #[serde(default = "default_volume_window")]
    pub volume_window: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairConfig {
    /// Number of top-correlated pairs to keep per scan
    #[serde(default = "default_n_pairs")]
    pub n_pairs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub random_forest: RandomForestParams,

    #[serde(default)]
    pub gradient_boosting: GradientBoostingParams,

    /// |z| above which a training step is labelled buy/sell
    #[serde(default = "default_entry_z")]
    pub entry_z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,

    /// Daily loss limit as a fraction of initial capital
    #[serde(default = "default_daily_loss_limit_fraction")]
    pub daily_loss_limit_fraction: f64,

    /// Maximum drawdown from initial capital
    #[serde(default = "default_max_drawdown_fraction")]
    pub max_drawdown_fraction: f64,

    /// Largest single open position as a fraction of current capital
    #[serde(default = "default_max_position_fraction")]
    pub max_position_fraction: f64,

    /// Closed trades needed before a Kelly hint is produced
    #[serde(default = "default_min_trades_for_kelly")]
    pub min_trades_for_kelly: u32,
}

// --------- Helper default functions for serde ---------
fn default_log_level() -> String {
    "info".to_string()
}
fn default_lookback() -> usize {
    20
}
fn default_volume_window() -> usize {
    10
}
fn default_n_pairs() -> usize {
    10
}
fn default_entry_z() -> f64 {
    2.0
}
fn default_initial_capital() -> f64 {
    10_000.0
}
fn default_daily_loss_limit_fraction() -> f64 {
    0.03
}
fn default_max_drawdown_fraction() -> f64 {
    0.15
}
fn default_max_position_fraction() -> f64 {
    0.2
}
fn default_min_trades_for_kelly() -> u32 {
    20
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { lookback: default_lookback(), volume_window: default_volume_window() }
    }
}

impl Default for PairConfig {
    fn default() -> Self {
        Self { n_pairs: default_n_pairs() }
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            random_forest: RandomForestParams::default(),
            gradient_boosting: GradientBoostingParams::default(),
            entry_z: default_entry_z(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            initial_capital: default_initial_capital(),
            daily_loss_limit_fraction: default_daily_loss_limit_fraction(),
            max_drawdown_fraction: default_max_drawdown_fraction(),
            max_position_fraction: default_max_position_fraction(),
            min_trades_for_kelly: default_min_trades_for_kelly(),
        }
    }
}

impl Config {
    /// Serialize default config to TOML string
    pub fn default_toml() -> Result<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }

    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {:?}: {}", path.as_ref(), e))
        })?;
        let mut cfg: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;
        cfg.merge_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Save the configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }
        std::fs::write(path, content).map_err(|e| {
            Error::ConfigError(format!("Failed to write config file {:?}: {}", path, e))
        })?;
        Ok(())
    }

    /// Validate ranges of every tunable
    pub fn validate(&self) -> Result<()> {
        let f = &self.features;
        if f.lookback < 2 {
            return Err(Error::ConfigError("features.lookback must be >= 2".to_string()));
        }
        if f.volume_window == 0 || f.volume_window > f.lookback {
            return Err(Error::ConfigError(format!(
                "features.volume_window must be in [1, {}]",
                f.lookback
            )));
        }
        if self.pairs.n_pairs == 0 {
            return Err(Error::ConfigError("pairs.n_pairs must be > 0".to_string()));
        }

        let e = &self.ensemble;
        if e.random_forest.n_estimators == 0 || e.gradient_boosting.n_estimators == 0 {
            return Err(Error::ConfigError("ensemble n_estimators must be > 0".to_string()));
        }
        if e.random_forest.max_depth == 0 || e.gradient_boosting.max_depth == 0 {
            return Err(Error::ConfigError("ensemble max_depth must be > 0".to_string()));
        }
        if !(e.gradient_boosting.learning_rate > 0.0) {
            return Err(Error::ConfigError(
                "ensemble.gradient_boosting.learning_rate must be > 0".to_string(),
            ));
        }
        if !(e.gradient_boosting.subsample > 0.0 && e.gradient_boosting.subsample <= 1.0) {
            return Err(Error::ConfigError(
                "ensemble.gradient_boosting.subsample must be in (0, 1]".to_string(),
            ));
        }
        if !(e.entry_z > 0.0) {
            return Err(Error::ConfigError("ensemble.entry_z must be > 0".to_string()));
        }

        let r = &self.risk;
        if !(r.initial_capital.is_finite() && r.initial_capital > 0.0) {
            return Err(Error::ConfigError("risk.initial_capital must be > 0".to_string()));
        }
        for (name, value) in [
            ("risk.daily_loss_limit_fraction", r.daily_loss_limit_fraction),
            ("risk.max_drawdown_fraction", r.max_drawdown_fraction),
            ("risk.max_position_fraction", r.max_position_fraction),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(Error::ConfigError(format!("{} must be in (0, 1)", name)));
            }
        }
        Ok(())
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        // Try to load from current directory
        if Path::new("stat_arb.toml").exists() {
            return Self::from_file("stat_arb.toml");
        }

        // Try to load from user config directory
        if let Some(mut path) = dirs::config_dir() {
            path.push("stat_arb");
            path.push("config.toml");
            if path.exists() {
                return Self::from_file(path);
            }
        }

        // Return default config if no config file found
        let mut config = Self::default();
        config.merge_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Merge environment variables into the configuration
    pub fn merge_env(&mut self) -> Result<()> {
        if let Ok(level) = env::var("STAT_ARB_LOG") {
            self.app.log_level = level;
        }
        if let Ok(capital) = env::var("STAT_ARB_INITIAL_CAPITAL") {
            self.risk.initial_capital = parse_env("STAT_ARB_INITIAL_CAPITAL", &capital)?;
        }
        if let Ok(lookback) = env::var("STAT_ARB_LOOKBACK") {
            self.features.lookback = parse_env("STAT_ARB_LOOKBACK", &lookback)?;
        }
        if let Ok(n_pairs) = env::var("STAT_ARB_N_PAIRS") {
            self.pairs.n_pairs = parse_env("STAT_ARB_N_PAIRS", &n_pairs)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::ConfigError(format!("Invalid value for {}: {:?} ({})", name, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.features.lookback, 20);
        assert_eq!(config.features.volume_window, 10);
        assert_eq!(config.pairs.n_pairs, 10);
        assert_eq!(config.ensemble.random_forest.n_estimators, 100);
        assert_eq!(config.ensemble.random_forest.max_depth, 5);
        assert_eq!(config.ensemble.gradient_boosting.max_depth, 3);
        assert_eq!(config.risk.initial_capital, 10_000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("stat_arb.toml");

        let mut config = Config::default();
        config.features.lookback = 30;
        config.ensemble.entry_z = 1.5;
        config.save(&config_path).unwrap();

        temp_env::with_vars_unset(
            vec!["STAT_ARB_LOG", "STAT_ARB_INITIAL_CAPITAL", "STAT_ARB_LOOKBACK", "STAT_ARB_N_PAIRS"],
            || {
                let loaded = Config::from_file(&config_path).unwrap();
                assert_eq!(loaded, config);
            },
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("partial.toml");
        std::fs::write(&path, "[risk]\ninitial_capital = 5000.0\n").unwrap();
        temp_env::with_vars_unset(vec!["STAT_ARB_INITIAL_CAPITAL", "STAT_ARB_LOOKBACK"], || {
            let loaded = Config::from_file(&path).unwrap();
            assert_eq!(loaded.risk.initial_capital, 5_000.0);
            assert_eq!(loaded.risk.max_drawdown_fraction, 0.15);
            assert_eq!(loaded.features.lookback, 20);
        });
    }

    #[test]
    fn test_default_toml_parses() {
        let text = Config::default_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_merge_env() {
        temp_env::with_vars(
            vec![
                ("STAT_ARB_LOG", Some("debug")),
                ("STAT_ARB_INITIAL_CAPITAL", Some("25000")),
                ("STAT_ARB_LOOKBACK", Some("40")),
                ("STAT_ARB_N_PAIRS", Some("3")),
            ],
            || {
                let mut config = Config::default();
                config.merge_env().unwrap();
                assert_eq!(config.app.log_level, "debug");
                assert_eq!(config.risk.initial_capital, 25_000.0);
                assert_eq!(config.features.lookback, 40);
                assert_eq!(config.pairs.n_pairs, 3);
            },
        );
    }

    #[test]
    fn test_merge_env_rejects_garbage() {
        temp_env::with_var("STAT_ARB_N_PAIRS", Some("many"), || {
            let mut config = Config::default();
            assert_matches!(config.merge_env(), Err(Error::ConfigError(_)));
        });
    }

    #[test]
    fn test_validation_failures() {
        let mut c = Config::default();
        c.features.lookback = 1;
        assert_matches!(c.validate(), Err(Error::ConfigError(_)));

        let mut c = Config::default();
        c.features.volume_window = 21;
        assert_matches!(c.validate(), Err(Error::ConfigError(_)));

        let mut c = Config::default();
        c.risk.max_drawdown_fraction = 1.0;
        assert_matches!(c.validate(), Err(Error::ConfigError(_)));

        let mut c = Config::default();
        c.ensemble.gradient_boosting.learning_rate = 0.0;
        assert_matches!(c.validate(), Err(Error::ConfigError(_)));

        let mut c = Config::default();
        c.ensemble.random_forest.n_estimators = 0;
        assert_matches!(c.validate(), Err(Error::ConfigError(_)));

        let mut c = Config::default();
        c.risk.initial_capital = -5.0;
        assert_matches!(c.validate(), Err(Error::ConfigError(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let temp_dir = tempdir().unwrap();
        assert_matches!(
            Config::from_file(temp_dir.path().join("absent.toml")),
            Err(Error::ConfigError(_))
        );
    }
}
