//! Custom error types for gapscholar.
//!
//! The API client turns most of these into "no data" at its boundary; only
//! snapshot loading, report writing and an empty library reach the caller.

use thiserror::Error;

/// Main error type for gap analysis operations.
#[derive(Debug, Error)]
pub enum GapError {
    /// Transport-level failure (timeout, connection refused)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Throttled by the external API (HTTP 429) on the given attempt
    #[error("Rate limited by external API (attempt {0})")]
    RateLimited(u32),

    /// External API returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message from API
        message: String,
    },

    /// Malformed payload or input record
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// The library snapshot contained no papers
    #[error("No library papers available for analysis")]
    EmptyLibrary,
}

impl GapError {
    /// Whether the failure is worth retrying with a fixed delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, GapError::Network(e) if !e.is_builder())
    }
}

/// Result type alias using `GapError`
pub type Result<T> = std::result::Result<T, GapError>;
