//! Error types for `MeetsMatch` core library.

use thiserror::Error;

/// Result type alias using `MeetsMatch` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `MeetsMatch` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown enum value in a persisted or wire representation
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
