//! Configuration for the market-data providers

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MarketError, Result};
use crate::normalize::UnitHeuristic;

/// Default Sina quotes host
pub const SINA_BASE_URL: &str = "https://money.finance.sina.com.cn";

/// Default EastMoney history host
pub const EASTMONEY_BASE_URL: &str = "https://push2his.eastmoney.com";

/// Configuration shared by the candle providers and the unifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Base URL for the long-history provider
    pub sina_base_url: String,

    /// Base URL for the real-time provider
    pub eastmoney_base_url: String,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Maximum requests per minute for each provider
    pub requests_per_minute: u32,

    /// User agent sent with every request
    pub user_agent: String,

    /// Lot-vs-share detection thresholds
    pub heuristic: UnitHeuristic,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            sina_base_url: SINA_BASE_URL.to_string(),
            eastmoney_base_url: EASTMONEY_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(15),
            requests_per_minute: 30,
            user_agent: concat!("wyckoff-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            heuristic: UnitHeuristic::default(),
        }
    }
}

impl MarketConfig {
    /// Create a new configuration builder
    pub fn builder() -> MarketConfigBuilder {
        MarketConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_minute == 0 {
            return Err(MarketError::ConfigError(
                "requests_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(MarketError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        let h = &self.heuristic;
        if h.lot_size <= 1.0 || h.tolerance < 1.0 {
            return Err(MarketError::ConfigError(format!(
                "invalid unit heuristic: lot_size={} tolerance={}",
                h.lot_size, h.tolerance
            )));
        }

        Ok(())
    }
}

/// Builder for MarketConfig
#[derive(Debug, Default)]
pub struct MarketConfigBuilder {
    sina_base_url: Option<String>,
    eastmoney_base_url: Option<String>,
    request_timeout: Option<Duration>,
    requests_per_minute: Option<u32>,
    user_agent: Option<String>,
    heuristic: Option<UnitHeuristic>,
}

impl MarketConfigBuilder {
    /// Override the Sina base URL
    pub fn sina_base_url(mut self, url: impl Into<String>) -> Self {
        self.sina_base_url = Some(url.into());
        self
    }

    /// Override the EastMoney base URL
    pub fn eastmoney_base_url(mut self, url: impl Into<String>) -> Self {
        self.eastmoney_base_url = Some(url.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the per-provider request budget
    pub fn requests_per_minute(mut self, limit: u32) -> Self {
        self.requests_per_minute = Some(limit);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the unit reconciliation thresholds
    pub fn heuristic(mut self, heuristic: UnitHeuristic) -> Self {
        self.heuristic = Some(heuristic);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<MarketConfig> {
        let defaults = MarketConfig::default();

        let config = MarketConfig {
            sina_base_url: self.sina_base_url.unwrap_or(defaults.sina_base_url),
            eastmoney_base_url: self.eastmoney_base_url.unwrap_or(defaults.eastmoney_base_url),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            requests_per_minute: self
                .requests_per_minute
                .unwrap_or(defaults.requests_per_minute),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            heuristic: self.heuristic.unwrap_or(defaults.heuristic),
        };

        config.validate()?;
        Ok(config)
    }
}
