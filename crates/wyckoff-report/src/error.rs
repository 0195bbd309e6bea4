//! Error types for report generation and delivery

use thiserror::Error;
use wyckoff_market::MarketError;

/// Report errors
#[derive(Debug, Error)]
pub enum ReportError {
    /// No prompt template could be located
    #[error("Prompt template not found: {0}")]
    PromptMissing(String),

    /// Template failed to parse or render
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Chart drawing failed
    #[error("Chart error: {0}")]
    Chart(String),

    /// HTML to PDF conversion failed
    #[error("PDF conversion failed: {0}")]
    Conversion(String),

    /// Indicator or CSV data could not be produced
    #[error("Data error: {0}")]
    Data(#[from] MarketError),

    /// Delivery endpoint throttled the upload
    #[error("Rate limited by {sink}")]
    RateLimited { sink: String },

    /// Delivery endpoint rejected the upload
    #[error("{sink} send failed (HTTP {status}): {body}")]
    SendFailed {
        sink: String,
        status: u16,
        body: String,
    },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, ReportError>;
