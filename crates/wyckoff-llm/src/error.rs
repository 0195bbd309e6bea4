//! Errors raised by inference providers

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

/// Provider failure, classified later by [`crate::ErrorPolicy`]
#[derive(Error, Debug)]
pub enum LLMError {
    /// The endpoint answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code returned by the endpoint
        status: u16,
        /// Response body, kept for diagnostics
        body: String,
    },

    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The body parsed but did not have the expected shape
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// The model answered but produced no text
    #[error("Model returned an empty response")]
    EmptyResponse,

    /// Missing API key or unusable endpoint settings
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// HTTP status associated with this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure happened below HTTP (no response was received)
    pub fn is_transport(&self) -> bool {
        match self {
            Self::HttpError(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_extraction() {
        let err = LLMError::Http {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.to_string(), "HTTP 429: slow down");
        assert!(!err.is_transport());

        assert_eq!(LLMError::EmptyResponse.status(), None);
    }
}
