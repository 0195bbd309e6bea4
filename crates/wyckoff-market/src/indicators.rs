//! Moving-average overlays and the CSV snapshot handed to prompts

use serde::Serialize;
use ta::Next;
use ta::indicators::SimpleMovingAverage;

use crate::candle::CandleSeries;
use crate::error::{MarketError, Result};

/// Short moving-average window
pub const MA_FAST: usize = 50;
/// Long moving-average window
pub const MA_SLOW: usize = 200;

const CSV_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A candle series with MA50 and MA200 columns
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    series: CandleSeries,
    ma50: Vec<Option<f64>>,
    ma200: Vec<Option<f64>>,
}

#[derive(Serialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    ma50: Option<f64>,
    ma200: Option<f64>,
}

/// Simple moving average over `values`; `None` until the window is full
pub fn sma(values: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    let mut indicator = SimpleMovingAverage::new(period)
        .map_err(|e| MarketError::ConfigError(format!("invalid SMA period {period}: {e:?}")))?;

    Ok(values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let avg = indicator.next(*v);
            (i + 1 >= period).then_some(avg)
        })
        .collect())
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

impl IndicatorFrame {
    /// Compute MA50 and MA200 over closing prices
    pub fn compute(series: CandleSeries) -> Result<Self> {
        let closes = series.closes();
        let ma50 = sma(&closes, MA_FAST)?;
        let ma200 = sma(&closes, MA_SLOW)?;
        Ok(Self {
            series,
            ma50,
            ma200,
        })
    }

    pub fn series(&self) -> &CandleSeries {
        &self.series
    }

    pub fn ma50(&self) -> &[Option<f64>] {
        &self.ma50
    }

    pub fn ma200(&self) -> &[Option<f64>] {
        &self.ma200
    }

    /// CSV with header `date,open,high,low,close,volume,ma50,ma200`
    ///
    /// Moving averages are rounded to three decimals; unfilled windows are
    /// empty cells.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for (i, bar) in self.series.bars().iter().enumerate() {
            writer.serialize(CsvRow {
                date: bar.timestamp.format(CSV_TIME_FORMAT).to_string(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                ma50: self.ma50[i].map(round3),
                ma200: self.ma200[i].map(round3),
            })?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| MarketError::ConfigError(format!("CSV buffer error: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| MarketError::ConfigError(format!("CSV is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::{Bar, Timeframe};
    use chrono::{Duration, NaiveDate};

    fn series(n: usize) -> CandleSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(9, 35, 0))
            .unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = 10.0 + i as f64;
                Bar {
                    timestamp: start + Duration::minutes(5 * i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1000.0,
                }
            })
            .collect();
        CandleSeries::from_bars("600970", Timeframe::M5, bars)
    }

    #[test]
    fn test_sma_fills_after_window() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 3).unwrap();
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
        assert!(sma(&[1.0], 0).is_err());
    }

    #[test]
    fn test_frame_columns() {
        let frame = IndicatorFrame::compute(series(210)).unwrap();
        assert_eq!(frame.ma50().len(), 210);
        assert!(frame.ma50()[48].is_none());
        // closes 10..=59 average to 34.5
        assert_eq!(frame.ma50()[49], Some(34.5));
        assert!(frame.ma200()[198].is_none());
        assert_eq!(frame.ma200()[199], Some(109.5));
    }

    #[test]
    fn test_to_csv() {
        let frame = IndicatorFrame::compute(series(2)).unwrap();
        let csv = frame.to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("date,open,high,low,close,volume,ma50,ma200")
        );
        assert_eq!(lines.next(), Some("2024-01-02 09:35,10.0,10.0,10.0,10.0,1000.0,,"));
        assert_eq!(lines.count(), 1);
    }
}
