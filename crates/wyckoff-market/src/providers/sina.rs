//! Sina long-history kline client
//!
//! `CN_MarketData.getKLineData` serves up to 1023 bars at 5/15/30/60-minute
//! scales with volume in shares. It has no 1-minute scale.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{
    SharedRateLimiter, check_status, http_client, parse_number, parse_timestamp, rate_limiter,
};
use crate::candle::{Bar, ProviderBatch, Timeframe, VolumeUnit};
use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::provider::CandleProvider;
use crate::symbol::sina_symbol;

const NAME: &str = "sina";
const KLINE_PATH: &str = "/quotes_service/api/json_v2.php/CN_MarketData.getKLineData";
const REFERER: &str = "https://finance.sina.com.cn";

/// Largest `datalen` the endpoint honours
pub const MAX_BARS: usize = 1023;

#[derive(Debug, Deserialize)]
struct SinaBar {
    day: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

impl SinaBar {
    fn into_bar(self) -> Option<Bar> {
        Some(Bar {
            timestamp: parse_timestamp(&self.day)?,
            open: parse_number(&self.open),
            high: parse_number(&self.high),
            low: parse_number(&self.low),
            close: parse_number(&self.close),
            volume: parse_number(&self.volume),
        })
    }
}

/// Sina quotes API client
#[derive(Debug, Clone)]
pub struct SinaClient {
    client: Client,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl SinaClient {
    /// Create a client from market configuration
    pub fn new(config: &MarketConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.sina_base_url.trim_end_matches('/').to_string(),
            rate_limiter: rate_limiter(config.requests_per_minute),
        })
    }
}

#[async_trait]
impl CandleProvider for SinaClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn volume_unit(&self) -> VolumeUnit {
        VolumeUnit::Shares
    }

    fn supports(&self, timeframe: Timeframe) -> bool {
        !timeframe.is_intraday_fine()
    }

    #[instrument(skip(self), fields(provider = NAME))]
    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: usize,
    ) -> Result<ProviderBatch> {
        if !self.supports(timeframe) {
            return Err(MarketError::UnsupportedTimeframe(timeframe.minutes()));
        }

        self.rate_limiter.until_ready().await;

        let url = format!("{}{KLINE_PATH}", self.base_url);
        let sina_code = sina_symbol(symbol);
        let scale = timeframe.minutes().to_string();
        let datalen = bars.min(MAX_BARS).to_string();
        let query = [
            ("symbol", sina_code.as_str()),
            ("scale", scale.as_str()),
            ("ma", "no"),
            ("datalen", datalen.as_str()),
        ];

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::REFERER, REFERER)
            .query(&query)
            .send()
            .await?;
        let text = check_status(NAME, response)?.text().await?;

        // Unknown symbols come back as a literal `null`
        let rows: Option<Vec<SinaBar>> = serde_json::from_str(text.trim())?;
        let rows = rows.unwrap_or_default();
        let total = rows.len();
        let parsed: Vec<Bar> = rows.into_iter().filter_map(SinaBar::into_bar).collect();

        debug!(rows = total, parsed = parsed.len(), "Fetched klines");
        Ok(ProviderBatch::new(NAME, VolumeUnit::Shares, parsed))
    }
}
