//! Error handling for the signal and risk core.

use thiserror::Error;

/// Main error type for the statistical-arbitrage core
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Data-quality errors (misaligned, short or malformed market data)
    #[error("Data error: {0}")]
    DataError(String),

    /// Inference requested from a model that has not been trained
    #[error("Model error: inference requested before training")]
    ModelNotTrained,

    /// Invalid argument errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

/// Result type for the statistical-arbitrage core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand used by the feature and model code paths.
    pub(crate) fn data(msg: impl Into<String>) -> Self {
        Error::DataError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_error = Error::ConfigError("missing field".to_string());
        assert_eq!(config_error.to_string(), "Configuration error: missing field");

        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let wrapped_io_error = Error::from(io_error);
        assert!(wrapped_io_error.to_string().contains("I/O error"));

        let data_error = Error::data("series too short");
        assert_eq!(data_error.to_string(), "Data error: series too short");

        assert!(Error::ModelNotTrained.to_string().contains("before training"));
    }

    #[test]
    fn test_result_type() {
        fn might_fail(ok: bool) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(Error::InvalidArgument("negative volatility".to_string()))
            }
        }

        assert!(might_fail(true).is_ok());
        assert!(might_fail(false).is_err());
    }
}
