//! Configuration error types.

use std::path::PathBuf;

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file has an extension we do not parse.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// The configuration file could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// An environment override holds an unusable value.
    #[error("Invalid environment override {name}: {message}")]
    InvalidEnv {
        /// Variable name.
        name: String,
        /// What was wrong with it.
        message: String,
    },

    /// The loaded configuration is inconsistent.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
