//! Row-level cleaning applied after the merge

use tracing::debug;

use crate::candle::{Bar, CandleSeries};

/// Drop rows containing NaN or infinite values
pub fn drop_non_finite(bars: Vec<Bar>) -> Vec<Bar> {
    let before = bars.len();
    let kept: Vec<Bar> = bars.into_iter().filter(Bar::is_finite).collect();
    if kept.len() < before {
        debug!(dropped = before - kept.len(), "Dropped non-finite bars");
    }
    kept
}

/// Replace zero opens with the previous close, or the bar's own close for the
/// first bar
///
/// Real-time feeds publish the opening auction bar with `open == 0`.
pub fn repair_zero_opens(bars: &mut [Bar]) {
    let mut prev_close: Option<f64> = None;
    for bar in bars.iter_mut() {
        if bar.open == 0.0 {
            bar.open = prev_close.unwrap_or(bar.close);
            bar.high = bar.high.max(bar.open);
            bar.low = if bar.low == 0.0 {
                bar.open.min(bar.close)
            } else {
                bar.low.min(bar.open)
            };
        }
        prev_close = Some(bar.close);
    }
}

/// Full cleaning pass over an ordered series
pub fn clean(series: CandleSeries) -> CandleSeries {
    series.map_bars(repair_zero_opens)
}
