//! Configuration error types.

use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Failed to parse environment variable.
    #[error("failed to parse {key}='{value}': {error}")]
    Parse {
        key: String,
        value: String,
        error: String,
    },
    /// Invalid value for environment variable.
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}
