//! Candlestick chart rendering

use async_trait::async_trait;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use wyckoff_market::IndicatorFrame;

use crate::error::{ReportError, Result};

const UP: RGBColor = RGBColor(0xff, 0x33, 0x33);
const DOWN: RGBColor = RGBColor(0x00, 0xb0, 0x60);
const MA50_COLOR: RGBColor = RGBColor(0xff, 0x99, 0x00);
const MA200_COLOR: RGBColor = RGBColor(0x21, 0x96, 0xf3);
const GRID: RGBColor = RGBColor(0xe6, 0xe6, 0xe6);

/// Renders an indicator frame to a PNG
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Draw the chart to `output` and return the PNG bytes
    async fn render(&self, frame: &IndicatorFrame, output: &Path) -> Result<Vec<u8>>;
}

/// Chart dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    /// Share of the height given to the price pane, in percent
    pub price_pane_pct: u32,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 900,
            price_pane_pct: 75,
        }
    }
}

/// Plotters backed renderer
///
/// Draws candles, MA50/MA200 overlays and a volume pane. Drawing is CPU
/// bound and runs on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct PlottersChart {
    style: ChartStyle,
}

impl PlottersChart {
    pub fn new(style: ChartStyle) -> Self {
        Self { style }
    }
}

#[async_trait]
impl ChartRenderer for PlottersChart {
    #[instrument(skip_all, fields(symbol = frame.series().symbol()))]
    async fn render(&self, frame: &IndicatorFrame, output: &Path) -> Result<Vec<u8>> {
        if frame.series().is_empty() {
            return Err(ReportError::Chart("no bars to chart".to_string()));
        }

        let frame = frame.clone();
        let output: PathBuf = output.to_path_buf();
        let style = self.style;

        let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            draw(&frame, &output, style)?;
            Ok(std::fs::read(&output)?)
        })
        .await
        .map_err(|e| ReportError::Chart(format!("render task failed: {e}")))??;

        debug!(bytes = png.len(), "Chart rendered");
        Ok(png)
    }
}

fn chart_err(e: impl std::fmt::Display) -> ReportError {
    ReportError::Chart(e.to_string())
}

/// Price axis bounds with a small margin
fn price_range(frame: &IndicatorFrame) -> (f64, f64) {
    let bars = frame.series().bars();
    let overlays = frame.ma50().iter().chain(frame.ma200()).flatten().copied();
    let lows = bars.iter().map(|b| b.low).chain(overlays.clone());
    let highs = bars.iter().map(|b| b.high).chain(overlays);

    let lo = lows.fold(f64::INFINITY, f64::min);
    let hi = highs.fold(f64::NEG_INFINITY, f64::max);
    let pad = ((hi - lo) * 0.05).max(0.01);
    (lo - pad, hi + pad)
}

fn draw(frame: &IndicatorFrame, output: &Path, style: ChartStyle) -> Result<()> {
    let series = frame.series();
    let bars = series.bars();
    let n = bars.len();
    let x_range = -1.0..n as f64;

    let root = BitMapBackend::new(output, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let split = (style.height * style.price_pane_pct / 100) as i32;
    let (upper, lower) = root.split_vertically(split);

    let (lo, hi) = price_range(frame);
    let mut price = ChartBuilder::on(&upper)
        .caption(format!("Wyckoff Setup: {}", series.symbol()), ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(0)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), lo..hi)
        .map_err(chart_err)?;

    price
        .configure_mesh()
        .light_line_style(GRID)
        .disable_x_mesh()
        .y_desc("Price")
        .draw()
        .map_err(chart_err)?;

    let plot_width = f64::from(style.width) - 80.0;
    let candle_px = ((plot_width / n as f64) * 0.7).clamp(1.0, 15.0) as u32;

    price
        .draw_series(bars.iter().enumerate().map(|(i, b)| {
            CandleStick::new(
                i as f64,
                b.open,
                b.high,
                b.low,
                b.close,
                UP.filled(),
                DOWN.filled(),
                candle_px,
            )
        }))
        .map_err(chart_err)?;

    for (values, color, label) in [
        (frame.ma50(), MA50_COLOR, "MA50"),
        (frame.ma200(), MA200_COLOR, "MA200"),
    ] {
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
            .collect();
        if points.is_empty() {
            continue;
        }
        price
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .map_err(chart_err)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    price
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(chart_err)?;

    let max_volume = bars.iter().map(|b| b.volume).fold(0.0, f64::max).max(1.0);
    let labels: Vec<String> = bars
        .iter()
        .map(|b| b.timestamp.format("%m-%d %H:%M").to_string())
        .collect();

    let mut volume = ChartBuilder::on(&lower)
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, 0.0..max_volume * 1.1)
        .map_err(chart_err)?;

    volume
        .configure_mesh()
        .light_line_style(GRID)
        .disable_x_mesh()
        .x_labels(8)
        .x_label_formatter(&|x| {
            let idx = x.round();
            if idx < 0.0 {
                return String::new();
            }
            labels.get(idx as usize).cloned().unwrap_or_default()
        })
        .y_desc("Volume")
        .draw()
        .map_err(chart_err)?;

    let half = 0.35;
    volume
        .draw_series(bars.iter().enumerate().map(|(i, b)| {
            let color = if b.is_up() { UP } else { DOWN };
            let x = i as f64;
            Rectangle::new([(x - half, 0.0), (x + half, b.volume)], color.filled())
        }))
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyckoff_market::{Bar, CandleSeries, Timeframe};

    fn frame(n: usize) -> IndicatorFrame {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(9, 35, 0))
            .unwrap();
        let bars = (0..n)
            .map(|i| {
                let base = 10.0 + (i as f64 * 0.3).sin();
                Bar {
                    timestamp: start + chrono::Duration::minutes(5 * i as i64),
                    open: base,
                    high: base + 0.2,
                    low: base - 0.2,
                    close: base + if i % 2 == 0 { 0.1 } else { -0.1 },
                    volume: 10_000.0 + i as f64,
                }
            })
            .collect();
        IndicatorFrame::compute(CandleSeries::from_bars("600970", Timeframe::M5, bars)).unwrap()
    }

    #[test]
    fn test_price_range_covers_bars_and_overlays() {
        let frame = frame(120);
        let (lo, hi) = price_range(&frame);
        for bar in frame.series().bars() {
            assert!(bar.low > lo && bar.high < hi);
        }
    }

    #[tokio::test]
    async fn test_empty_frame_rejected() {
        let empty = IndicatorFrame::compute(CandleSeries::from_bars(
            "600970",
            Timeframe::M5,
            Vec::new(),
        ))
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = PlottersChart::default()
            .render(&empty, &dir.path().join("chart.png"))
            .await;
        assert!(matches!(result, Err(ReportError::Chart(_))));
    }

    #[tokio::test]
    #[ignore = "requires system fonts"]
    async fn test_render_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.png");
        let png = PlottersChart::default().render(&frame(250), &path).await.unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
        assert!(path.exists());
    }
}
