//! Concrete candle providers

pub mod eastmoney;
pub mod sina;

pub use eastmoney::EastMoneyClient;
pub use sina::SinaClient;

use chrono::NaiveDateTime;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::config::MarketConfig;
use crate::error::{MarketError, Result};

pub(crate) type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

pub(crate) fn rate_limiter(per_minute: u32) -> SharedRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

pub(crate) fn http_client(config: &MarketConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(config.request_timeout)
        .user_agent(config.user_agent.as_str())
        .build()?)
}

/// Map throttling and other non-2xx responses to errors
pub(crate) fn check_status(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(MarketError::RateLimitExceeded {
            provider: provider.to_string(),
        });
    }
    if !status.is_success() {
        return Err(MarketError::provider(provider, format!("HTTP error: {status}")));
    }
    Ok(response)
}

/// Parse the timestamp layouts used by the quote APIs
pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parse a numeric field, treating `"-"` and blanks as NaN so the row is
/// dropped during cleaning
pub(crate) fn parse_number(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(f64::NAN)
}
