//! Common error types for council vote consolidation

use thiserror::Error;

/// Common result type for cvr operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the engine and the host binary
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error (store, observations, anchors, report)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration could not be parsed
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML configuration could not be written
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input file or parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
