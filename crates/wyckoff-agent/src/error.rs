//! Error types for the agent

use thiserror::Error;
use wyckoff_llm::{DispatchError, LLMError};
use wyckoff_market::MarketError;
use wyckoff_report::ReportError;
use wyckoff_utils::EnvError;

/// Agent errors
#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid or inconsistent settings
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Env(#[from] EnvError),

    /// Configuration file could not be parsed
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Watchlist row could not be used
    #[error("Watchlist error: {0}")]
    Watchlist(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Llm(#[from] LLMError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
