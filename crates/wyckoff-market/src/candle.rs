//! Candle types: bars, provider batches and the unified series

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::MarketError;

/// Shares per board lot on A-share exchanges
pub const LOT_SIZE: f64 = 100.0;

/// One OHLCV record
///
/// `timestamp` is the exchange-local wall-clock time at which the bar closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Whether every price and the volume are finite numbers
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Close at or above open
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// Bar interval
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum Timeframe {
    M1,
    #[default]
    M5,
    M15,
    M30,
    M60,
}

impl Timeframe {
    /// Interval length in minutes
    pub fn minutes(self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::M60 => 60,
        }
    }

    /// Sub-5-minute bars are only available from real-time sources
    pub fn is_intraday_fine(self) -> bool {
        self.minutes() < 5
    }
}

impl TryFrom<u32> for Timeframe {
    type Error = MarketError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            1 => Ok(Self::M1),
            5 => Ok(Self::M5),
            15 => Ok(Self::M15),
            30 => Ok(Self::M30),
            60 => Ok(Self::M60),
            other => Err(MarketError::UnsupportedTimeframe(other)),
        }
    }
}

impl From<Timeframe> for u32 {
    fn from(tf: Timeframe) -> Self {
        tf.minutes()
    }
}

impl FromStr for Timeframe {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(['m', 'M']);
        let minutes: u32 = trimmed
            .parse()
            .map_err(|_| MarketError::ConfigError(format!("invalid timeframe '{s}'")))?;
        Self::try_from(minutes)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}

/// Unit a provider reports trade volume in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeUnit {
    Shares,
    /// Board lots of [`LOT_SIZE`] shares
    Lots,
}

impl VolumeUnit {
    /// Multiplier converting this unit to shares
    pub fn share_factor(self) -> f64 {
        match self {
            Self::Shares => 1.0,
            Self::Lots => LOT_SIZE,
        }
    }
}

/// Raw provider output before cleaning
///
/// May be unsorted, overlap with other batches, and carry volume in lots.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderBatch {
    pub provider: String,
    pub unit: VolumeUnit,
    pub bars: Vec<Bar>,
}

impl ProviderBatch {
    pub fn new(provider: impl Into<String>, unit: VolumeUnit, bars: Vec<Bar>) -> Self {
        Self {
            provider: provider.into(),
            unit,
            bars,
        }
    }

    /// Empty batch attributed to `provider`
    pub fn empty(provider: impl Into<String>, unit: VolumeUnit) -> Self {
        Self::new(provider, unit, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Multiply every volume by `factor`
    pub fn scale_volume(&mut self, factor: f64) {
        for bar in &mut self.bars {
            bar.volume *= factor;
        }
    }

    /// Convert volumes to shares according to the declared unit
    pub fn into_shares(mut self) -> Self {
        let factor = self.unit.share_factor();
        if (factor - 1.0).abs() > f64::EPSILON {
            self.scale_volume(factor);
        }
        self.unit = VolumeUnit::Shares;
        self
    }
}

/// Ordered bar sequence with strictly increasing, unique timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    symbol: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl CandleSeries {
    /// Build a series from bars in any order
    ///
    /// Bars are sorted by timestamp; when a timestamp repeats, the bar that
    /// comes later in `bars` wins.
    pub fn from_bars(symbol: impl Into<String>, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        let mut by_ts: BTreeMap<NaiveDateTime, Bar> = BTreeMap::new();
        for bar in bars {
            by_ts.insert(bar.timestamp, bar);
        }

        Self {
            symbol: symbol.into(),
            timeframe,
            bars: by_ts.into_values().collect(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Closing prices in order
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Keep only the most recent `n` bars
    pub fn tail(mut self, n: usize) -> Self {
        if self.bars.len() > n {
            self.bars.drain(..self.bars.len() - n);
        }
        self
    }

    /// Apply an in-place fix that cannot reorder timestamps
    pub(crate) fn map_bars(mut self, f: impl FnOnce(&mut [Bar])) -> Self {
        f(&mut self.bars);
        self
    }
}

#[cfg(test)]
pub(crate) fn bar_at(ts: &str, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M").unwrap(),
        open: close,
        high: close,
        low: close,
        close,
        volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parsing() {
        assert_eq!("5".parse::<Timeframe>().unwrap(), Timeframe::M5);
        assert_eq!(" 15m ".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert_eq!(Timeframe::try_from(1).unwrap(), Timeframe::M1);
        assert!(matches!(
            Timeframe::try_from(3),
            Err(MarketError::UnsupportedTimeframe(3))
        ));
        assert!("abc".parse::<Timeframe>().is_err());
        assert_eq!(Timeframe::default(), Timeframe::M5);
        assert_eq!(Timeframe::M60.to_string(), "60m");
    }

    #[test]
    fn test_timeframe_serde_as_minutes() {
        let tf: Timeframe = serde_json::from_str("30").unwrap();
        assert_eq!(tf, Timeframe::M30);
        assert_eq!(serde_json::to_string(&Timeframe::M1).unwrap(), "1");
        assert!(serde_json::from_str::<Timeframe>("7").is_err());
    }

    #[test]
    fn test_from_bars_sorts_and_keeps_last_duplicate() {
        let series = CandleSeries::from_bars(
            "600970",
            Timeframe::M5,
            vec![
                bar_at("2024-01-02 09:40", 10.2, 100.0),
                bar_at("2024-01-02 09:35", 10.0, 100.0),
                bar_at("2024-01-02 09:40", 10.3, 200.0),
            ],
        );

        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].close, 10.0);
        assert_eq!(series.bars()[1].close, 10.3);
        assert_eq!(series.bars()[1].volume, 200.0);
    }

    #[test]
    fn test_tail() {
        let series = CandleSeries::from_bars(
            "600970",
            Timeframe::M5,
            vec![
                bar_at("2024-01-02 09:35", 1.0, 1.0),
                bar_at("2024-01-02 09:40", 2.0, 1.0),
                bar_at("2024-01-02 09:45", 3.0, 1.0),
            ],
        );
        let tail = series.clone().tail(2);
        assert_eq!(tail.closes(), vec![2.0, 3.0]);
        assert_eq!(series.tail(10).len(), 3);
    }

    #[test]
    fn test_batch_into_shares() {
        let batch = ProviderBatch::new(
            "eastmoney",
            VolumeUnit::Lots,
            vec![bar_at("2024-01-02 09:35", 1.0, 12.0)],
        )
        .into_shares();
        assert_eq!(batch.unit, VolumeUnit::Shares);
        assert_eq!(batch.bars[0].volume, 1200.0);
    }
}
