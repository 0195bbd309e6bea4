//! Error types for market data operations

use thiserror::Error;

/// Market data errors
#[derive(Debug, Error)]
pub enum MarketError {
    /// Neither provider produced usable candles
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Symbol cannot be mapped to an A-share code
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Timeframe outside the supported set
    #[error("Unsupported timeframe: {0} minute(s)")]
    UnsupportedTimeframe(u32),

    /// Provider answered with an error or an unusable payload
    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    /// Provider throttled the request
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MarketError {
    pub(crate) fn provider(provider: &str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MarketError::DataUnavailable {
            symbol: "600970".to_string(),
            reason: "both providers returned no bars".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Data not available for 600970: both providers returned no bars"
        );

        let err = MarketError::provider("eastmoney", "data is null");
        assert_eq!(err.to_string(), "eastmoney error: data is null");
    }
}
