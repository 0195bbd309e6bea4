//! Two-source candle unifier
//!
//! Fetches from a long-history provider and a real-time provider, reconciles
//! volume units, merges with real-time precedence and cleans the result.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::candle::{CandleSeries, ProviderBatch, Timeframe};
use crate::clean::{clean, drop_non_finite};
use crate::error::{MarketError, Result};
use crate::normalize::UnitHeuristic;
use crate::provider::CandleProvider;
use crate::symbol::normalize_symbol;

/// Merges a long-history and a real-time provider into one series
#[derive(Clone)]
pub struct DataUnifier {
    history: Arc<dyn CandleProvider>,
    realtime: Arc<dyn CandleProvider>,
    heuristic: UnitHeuristic,
}

impl std::fmt::Debug for DataUnifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataUnifier")
            .field("history", &self.history.name())
            .field("realtime", &self.realtime.name())
            .field("heuristic", &self.heuristic)
            .finish()
    }
}

impl DataUnifier {
    pub fn new(history: Arc<dyn CandleProvider>, realtime: Arc<dyn CandleProvider>) -> Self {
        Self {
            history,
            realtime,
            heuristic: UnitHeuristic::default(),
        }
    }

    /// Override the unit-mismatch thresholds
    pub fn with_heuristic(mut self, heuristic: UnitHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Produce one ordered series of at most `bars` candles
    ///
    /// The history provider is skipped for timeframes it cannot serve (1
    /// minute). A failing provider is logged and treated as empty; only when
    /// both come back empty does this return [`MarketError::DataUnavailable`].
    #[instrument(
        skip(self),
        fields(history = self.history.name(), realtime = self.realtime.name())
    )]
    pub async fn unify(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: usize,
    ) -> Result<CandleSeries> {
        let symbol = normalize_symbol(symbol)?;

        // Sub-5-minute requests never reach the long-history source, whatever
        // it claims to support.
        let history = if !timeframe.is_intraday_fine() && self.history.supports(timeframe) {
            fetch_or_empty(self.history.as_ref(), &symbol, timeframe, bars).await
        } else {
            debug!(%timeframe, "History provider skipped for this timeframe");
            ProviderBatch::empty(self.history.name(), self.history.volume_unit())
        };

        let realtime = if self.realtime.supports(timeframe) {
            fetch_or_empty(self.realtime.as_ref(), &symbol, timeframe, bars).await
        } else {
            ProviderBatch::empty(self.realtime.name(), self.realtime.volume_unit())
        };

        if history.is_empty() && realtime.is_empty() {
            return Err(MarketError::DataUnavailable {
                symbol,
                reason: format!("both providers returned no {timeframe} bars"),
            });
        }

        let (history, realtime, correction) = self.heuristic.reconcile(history, realtime);
        let history_len = history.bars.len();
        let realtime_len = realtime.bars.len();

        // History first so real-time rows overwrite shared timestamps
        let mut merged = history.bars;
        merged.extend(realtime.bars);
        let merged = drop_non_finite(merged);

        if merged.is_empty() {
            return Err(MarketError::DataUnavailable {
                symbol,
                reason: "no finite bars after cleaning".to_string(),
            });
        }

        let series = clean(CandleSeries::from_bars(symbol, timeframe, merged)).tail(bars);

        info!(
            history_bars = history_len,
            realtime_bars = realtime_len,
            unified_bars = series.len(),
            ?correction,
            "Candle series unified"
        );

        Ok(series)
    }
}

async fn fetch_or_empty(
    provider: &dyn CandleProvider,
    symbol: &str,
    timeframe: Timeframe,
    bars: usize,
) -> ProviderBatch {
    match provider.fetch(symbol, timeframe, bars).await {
        Ok(batch) => batch,
        Err(e) => {
            warn!(
                provider = provider.name(),
                error = %e,
                "Provider fetch failed, continuing without it"
            );
            ProviderBatch::empty(provider.name(), provider.volume_unit())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::{Bar, VolumeUnit, bar_at};
    use crate::provider::MockCandleProvider;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn mock_provider(
        name: &'static str,
        unit: VolumeUnit,
        fine_grained: bool,
    ) -> MockCandleProvider {
        let mut mock = MockCandleProvider::new();
        mock.expect_name().return_const(name);
        mock.expect_volume_unit().return_const(unit);
        mock.expect_supports()
            .returning(move |tf| fine_grained || !tf.is_intraday_fine());
        mock
    }

    fn history_mock(rows: Vec<Bar>) -> MockCandleProvider {
        let mut mock = mock_provider("sina", VolumeUnit::Shares, false);
        mock.expect_fetch().times(1).returning(move |_, _, _| {
            Ok(ProviderBatch::new("sina", VolumeUnit::Shares, rows.clone()))
        });
        mock
    }

    fn realtime_mock(rows: Vec<Bar>) -> MockCandleProvider {
        let mut mock = mock_provider("eastmoney", VolumeUnit::Lots, true);
        mock.expect_fetch().times(1).returning(move |_, _, _| {
            Ok(ProviderBatch::new("eastmoney", VolumeUnit::Lots, rows.clone()))
        });
        mock
    }

    fn unifier(history: MockCandleProvider, realtime: MockCandleProvider) -> DataUnifier {
        DataUnifier::new(Arc::new(history), Arc::new(realtime))
    }

    #[tokio::test]
    async fn test_merge_prefers_realtime_and_converts_lots() {
        let history = history_mock(vec![
            bar_at("2024-01-02 09:35", 10.0, 100_000.0),
            bar_at("2024-01-02 09:40", 10.1, 110_000.0),
        ]);
        let realtime = realtime_mock(vec![
            bar_at("2024-01-02 09:40", 10.2, 1_200.0),
            bar_at("2024-01-02 09:45", 10.3, 1_300.0),
        ]);

        let series = unifier(history, realtime)
            .unify("600970", Timeframe::M5, 500)
            .await
            .unwrap();

        assert_eq!(series.symbol(), "600970");
        assert_eq!(series.closes(), vec![10.0, 10.2, 10.3]);
        let volumes: Vec<f64> = series.bars().iter().map(|b| b.volume).collect();
        assert_eq!(volumes, vec![100_000.0, 120_000.0, 130_000.0]);
    }

    #[tokio::test]
    async fn test_one_minute_never_calls_history() {
        let mut history = mock_provider("sina", VolumeUnit::Shares, false);
        history.expect_fetch().never();
        let realtime = realtime_mock(vec![
            bar_at("2024-01-02 09:31", 10.0, 50.0),
            bar_at("2024-01-02 09:32", 10.1, 60.0),
        ]);

        let series = unifier(history, realtime)
            .unify("600970", Timeframe::M1, 500)
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].volume, 5_000.0);
    }

    #[tokio::test]
    async fn test_one_minute_skips_history_even_if_supported() {
        let mut history = mock_provider("sina", VolumeUnit::Shares, true);
        history.expect_fetch().never();
        let realtime = realtime_mock(vec![bar_at("2024-01-02 09:31", 10.0, 50.0)]);

        let series = unifier(history, realtime)
            .unify("600970", Timeframe::M1, 500)
            .await
            .unwrap();
        assert_eq!(series.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_provider_treated_as_empty() {
        let history = history_mock(vec![bar_at("2024-01-02 09:35", 10.0, 100_000.0)]);
        let mut realtime = mock_provider("eastmoney", VolumeUnit::Lots, true);
        realtime
            .expect_fetch()
            .times(1)
            .returning(|_, _, _| Err(MarketError::provider("eastmoney", "boom")));

        let series = unifier(history, realtime)
            .unify("600970", Timeframe::M5, 500)
            .await
            .unwrap();
        assert_eq!(series.len(), 1);
    }

    #[tokio::test]
    async fn test_both_empty_is_data_unavailable() {
        let history = history_mock(Vec::new());
        let realtime = realtime_mock(Vec::new());

        let result = unifier(history, realtime)
            .unify("600970", Timeframe::M15, 100)
            .await;
        assert!(matches!(result, Err(MarketError::DataUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_invalid_symbol_rejected_before_fetch() {
        let mut history = mock_provider("sina", VolumeUnit::Shares, false);
        history.expect_fetch().never();
        let mut realtime = mock_provider("eastmoney", VolumeUnit::Lots, true);
        realtime.expect_fetch().never();

        let result = unifier(history, realtime)
            .unify("not-a-code", Timeframe::M5, 100)
            .await;
        assert!(matches!(result, Err(MarketError::InvalidSymbol(_))));
    }

    #[tokio::test]
    async fn test_cleaning_and_tail() {
        let mut opening = bar_at("2024-01-02 09:35", 10.0, 100_000.0);
        opening.open = 0.0;
        let mut broken = bar_at("2024-01-02 09:40", 10.1, 100_000.0);
        broken.close = f64::NAN;
        let history = history_mock(vec![
            opening,
            broken,
            bar_at("2024-01-02 09:45", 10.2, 100_000.0),
            bar_at("2024-01-02 09:50", 10.3, 100_000.0),
        ]);
        let realtime = realtime_mock(Vec::new());

        let series = unifier(history, realtime)
            .unify("600970", Timeframe::M5, 2)
            .await
            .unwrap();
        assert_eq!(series.closes(), vec![10.2, 10.3]);

        let history = history_mock(vec![opening]);
        let series = unifier(history, realtime_mock(Vec::new()))
            .unify("600970", Timeframe::M5, 10)
            .await
            .unwrap();
        assert_eq!(series.bars()[0].open, 10.0);
    }

    fn stamp(i: usize) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap()
            + Duration::minutes(5 * i as i64)
    }

    fn rows(start: usize, volumes: &[f64]) -> Vec<Bar> {
        volumes
            .iter()
            .enumerate()
            .map(|(i, v)| Bar {
                timestamp: stamp(start + i),
                open: 10.0,
                high: 10.5,
                low: 9.5,
                close: 10.0,
                volume: *v,
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_unified_series_ordered_with_consistent_units(
            hist_vols in prop::collection::vec(20_000.0f64..40_000.0, 1..60),
            rt_vols in prop::collection::vec(200.0f64..400.0, 1..60),
            offset in 0usize..80,
            mislabelled in any::<bool>(),
        ) {
            // Real-time volumes are in lots; when mislabelled the provider
            // claims shares and only the median check can catch it.
            let rt_unit = if mislabelled { VolumeUnit::Shares } else { VolumeUnit::Lots };
            let history_rows = rows(0, &hist_vols);
            let realtime_rows = rows(offset, &rt_vols);

            let mut history = mock_provider("sina", VolumeUnit::Shares, false);
            history.expect_fetch().returning(move |_, _, _| {
                Ok(ProviderBatch::new("sina", VolumeUnit::Shares, history_rows.clone()))
            });
            let mut realtime = mock_provider("eastmoney", rt_unit, true);
            realtime.expect_fetch().returning(move |_, _, _| {
                Ok(ProviderBatch::new("eastmoney", rt_unit, realtime_rows.clone()))
            });

            let runtime = tokio::runtime::Runtime::new().unwrap();
            let series = runtime
                .block_on(unifier(history, realtime).unify("600970", Timeframe::M5, 1000))
                .unwrap();

            prop_assert!(series.bars().windows(2).all(|w| w[0].timestamp < w[1].timestamp));

            let max = series.bars().iter().map(|b| b.volume).fold(f64::MIN, f64::max);
            let min = series.bars().iter().map(|b| b.volume).fold(f64::MAX, f64::min);
            prop_assert!(max / min < 10.0, "max={max} min={min}");
        }
    }
}
