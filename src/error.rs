//! Error types for rate-limit metrics
//!
//! Recording operations never return errors. Only bootstrap, configuration
//! loading and the background key-count sources can fail.

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Metric registration failed: {0}")]
    Registration(#[from] prometheus::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to parse JSON config file {path}: {source}")]
    ConfigJsonParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid window duration: {0}")]
    InvalidWindow(String),

    #[error("Failed to encode metrics: {0}")]
    Encode(String),

    #[error("Key count unavailable for zone '{zone}': {reason}")]
    KeyCountUnavailable { zone: String, reason: String },
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
