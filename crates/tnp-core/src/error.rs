//! Error types for the datacard builder

use thiserror::Error;

/// Builder error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or inconsistent analysis configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required entry (histogram slot, category, key) is missing
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Expression parsing error
    #[error("Expression error: {0}")]
    Expression(String),

    /// Event store access error (opening files, reading trees/columns)
    #[error("Event store error: {0}")]
    EventStore(String),

    /// Histogram arithmetic error (empty combine, binning mismatch)
    #[error("Histogram error: {0}")]
    Histogram(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
