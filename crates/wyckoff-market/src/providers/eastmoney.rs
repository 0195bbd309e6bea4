//! EastMoney real-time kline client
//!
//! Serves 1/5/15/30/60-minute bars from the `push2his` kline endpoint,
//! forward-adjusted. Volume is reported in lots.

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
use crate::symbol::eastmoney_secid;

const NAME: &str = "eastmoney";
const KLINE_PATH: &str = "/api/qt/stock/kline/get";

#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

/// EastMoney kline API client
#[derive(Debug, Clone)]
pub struct EastMoneyClient {
    client: Client,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl EastMoneyClient {
    /// Create a client from market configuration
    pub fn new(config: &MarketConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.eastmoney_base_url.trim_end_matches('/').to_string(),
            rate_limiter: rate_limiter(config.requests_per_minute),
        })
    }

    /// Parse one `date,open,close,high,low,volume,...` kline row
    fn parse_kline(row: &str) -> Option<Bar> {
        let fields: Vec<&str> = row.split(',').collect();
        if fields.len() < 6 {
            return None;
        }
        Some(Bar {
            timestamp: parse_timestamp(fields[0])?,
            open: parse_number(fields[1]),
            close: parse_number(fields[2]),
            high: parse_number(fields[3]),
            low: parse_number(fields[4]),
            volume: parse_number(fields[5]),
        })
    }
}

#[async_trait]
impl CandleProvider for EastMoneyClient {
    fn name(&self) -> &'static str {
        NAME
    }

    fn volume_unit(&self) -> VolumeUnit {
        VolumeUnit::Lots
    }

    fn supports(&self, _timeframe: Timeframe) -> bool {
        true
    }

    #[instrument(skip(self), fields(provider = NAME))]
    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: usize,
    ) -> Result<ProviderBatch> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{KLINE_PATH}", self.base_url);
        let secid = eastmoney_secid(symbol);
        let klt = timeframe.minutes().to_string();
        let lmt = bars.to_string();
        let query = [
            ("secid", secid.as_str()),
            ("fields1", "f1,f2,f3,f4,f5,f6"),
            ("fields2", "f51,f52,f53,f54,f55,f56,f57,f58"),
            ("klt", klt.as_str()),
            ("fqt", "1"),
            ("beg", "0"),
            ("end", "20500000"),
            ("lmt", lmt.as_str()),
        ];

        let response = self.client.get(&url).query(&query).send().await?;
        let body: KlineResponse = check_status(NAME, response)?.json().await?;

        let data = body
            .data
            .ok_or_else(|| MarketError::provider(NAME, format!("no data for {secid}")))?;

        let parsed: Vec<Bar> = data
            .klines
            .iter()
            .filter_map(|row| Self::parse_kline(row))
            .collect();

        debug!(rows = data.klines.len(), parsed = parsed.len(), "Fetched klines");
        Ok(ProviderBatch::new(NAME, VolumeUnit::Lots, parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::Server) -> EastMoneyClient {
        let config = MarketConfig::builder()
            .eastmoney_base_url(server.url())
            .build()
            .unwrap();
        EastMoneyClient::new(&config).unwrap()
    }

    #[test]
    fn test_parse_kline() {
        let bar = EastMoneyClient::parse_kline(
            "2024-01-02 09:35,10.00,10.05,10.08,9.99,1234,1240000.00,0.90",
        )
        .unwrap();
        assert_eq!(bar.open, 10.00);
        assert_eq!(bar.close, 10.05);
        assert_eq!(bar.high, 10.08);
        assert_eq!(bar.low, 9.99);
        assert_eq!(bar.volume, 1234.0);

        assert!(EastMoneyClient::parse_kline("garbage").is_none());
        assert!(EastMoneyClient::parse_kline("not-a-date,1,1,1,1,1").is_none());
    }

    #[tokio::test]
    async fn test_fetch_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", KLINE_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("secid".into(), "1.600970".into()),
                Matcher::UrlEncoded("klt".into(), "5".into()),
                Matcher::UrlEncoded("fqt".into(), "1".into()),
                Matcher::UrlEncoded("lmt".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "rc": 0,
                    "data": {
                        "code": "600970",
                        "klines": [
                            "2024-01-02 09:35,10.00,10.05,10.08,9.99,1234,1240000.00,0.90",
                            "2024-01-02 09:40,10.05,10.10,10.12,10.01,987,998000.00,1.10"
                        ]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let batch = client_for(&server)
            .fetch("600970", Timeframe::M5, 2)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(batch.provider, "eastmoney");
        assert_eq!(batch.unit, VolumeUnit::Lots);
        assert_eq!(batch.bars.len(), 2);
        assert_eq!(batch.bars[1].volume, 987.0);
    }

    #[tokio::test]
    async fn test_null_data_is_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", KLINE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"rc":0,"data":null}"#)
            .create_async()
            .await;

        let result = client_for(&server).fetch("000001", Timeframe::M1, 10).await;
        assert!(matches!(result, Err(MarketError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", KLINE_PATH)
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let result = client_for(&server).fetch("000001", Timeframe::M5, 10).await;
        assert!(matches!(result, Err(MarketError::RateLimitExceeded { .. })));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_live_fetch() {
        let client = EastMoneyClient::new(&MarketConfig::default()).unwrap();
        let batch = client.fetch("600970", Timeframe::M5, 20).await.unwrap();
        assert!(!batch.bars.is_empty());
    }
}
