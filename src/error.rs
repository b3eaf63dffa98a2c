//! Custom error types for scholardock.
//!
//! Only failures outside the page loop surface as errors: session setup,
//! configuration and query validation. Page and node level problems are
//! logged and skipped by the harvester.

use thiserror::Error;

/// Main error type for scholardock operations.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Browser automation error (Chromium / CDP)
    #[error("Browser error: {0}")]
    Browser(String),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by the upstream index
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Upstream returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Status description
        message: String,
    },

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using `HarvestError`
pub type Result<T> = std::result::Result<T, HarvestError>;
