//! Error types for the medtrack_core library.

use std::io;
use std::path::PathBuf;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medtrack_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A time-of-day that is not a valid 24-hour `HH:MM` value
    #[error("Invalid time format: {0:?} (expected HH:MM, 24-hour)")]
    InvalidTimeFormat(String),

    /// A weekday code that is not in the code table
    #[error("Invalid recurrence code: {0:?}")]
    InvalidRecurrenceCode(String),

    /// The data directory backing the store cannot be opened
    #[error("Store unavailable at {path:?}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Lookup of a medicine or rule failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
