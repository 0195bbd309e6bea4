//! Candle provider trait

use async_trait::async_trait;

use crate::candle::{ProviderBatch, Timeframe, VolumeUnit};
use crate::error::Result;

/// A source of raw OHLCV batches for A-share symbols
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandleProvider: Send + Sync {
    /// Short provider name used in logs and batch attribution
    fn name(&self) -> &'static str;

    /// Unit this provider reports volume in
    fn volume_unit(&self) -> VolumeUnit;

    /// Whether this provider can serve the given interval
    fn supports(&self, timeframe: Timeframe) -> bool;

    /// Fetch up to `bars` of the most recent candles
    ///
    /// `symbol` is a normalized 6-digit code.
    async fn fetch(&self, symbol: &str, timeframe: Timeframe, bars: usize)
    -> Result<ProviderBatch>;
}
