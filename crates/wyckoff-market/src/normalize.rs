//! Volume-unit reconciliation between providers
//!
//! Declared units are applied first. A median comparison then catches
//! providers that report lots while claiming shares (or vice versa).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::candle::{LOT_SIZE, ProviderBatch};

/// Thresholds for detecting a lot-vs-share mismatch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitHeuristic {
    /// Shares per lot
    pub lot_size: f64,
    /// Accepted ratio window is `[lot_size / tolerance, lot_size * tolerance]`
    pub tolerance: f64,
    /// Minimum overlapping timestamps before the overlap is used for medians
    pub min_overlap: usize,
}

impl Default for UnitHeuristic {
    fn default() -> Self {
        Self {
            lot_size: LOT_SIZE,
            tolerance: 3.0,
            min_overlap: 5,
        }
    }
}

/// Which batch, if any, was rescaled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitCorrection {
    None,
    /// The historical batch was multiplied by the lot size
    ScaledHistory,
    /// The real-time batch was multiplied by the lot size
    ScaledRealtime,
}

/// Median of the non-zero, finite values
pub fn median_nonzero(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut v: Vec<f64> = values
        .into_iter()
        .filter(|x| x.is_finite() && *x > 0.0)
        .collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    Some(if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    })
}

impl UnitHeuristic {
    /// Whether `ratio` (larger median over smaller) looks like one lot
    pub fn is_lot_ratio(&self, ratio: f64) -> bool {
        ratio >= self.lot_size / self.tolerance && ratio <= self.lot_size * self.tolerance
    }

    /// Bring both batches to the share convention
    ///
    /// Both batches are converted by their declared unit first. When both are
    /// non-empty their median volumes are compared; if one is roughly
    /// `lot_size` times the other, the smaller batch is scaled up.
    pub fn reconcile(
        &self,
        history: ProviderBatch,
        realtime: ProviderBatch,
    ) -> (ProviderBatch, ProviderBatch, UnitCorrection) {
        let mut history = history.into_shares();
        let mut realtime = realtime.into_shares();

        if history.is_empty() || realtime.is_empty() {
            return (history, realtime, UnitCorrection::None);
        }

        let (hist_median, rt_median) = self.medians(&history, &realtime);
        let (Some(h), Some(r)) = (hist_median, rt_median) else {
            return (history, realtime, UnitCorrection::None);
        };

        let correction = if h >= r && self.is_lot_ratio(h / r) {
            realtime.scale_volume(self.lot_size);
            UnitCorrection::ScaledRealtime
        } else if r > h && self.is_lot_ratio(r / h) {
            history.scale_volume(self.lot_size);
            UnitCorrection::ScaledHistory
        } else {
            UnitCorrection::None
        };

        if correction != UnitCorrection::None {
            tracing::info!(
                history = %history.provider,
                realtime = %realtime.provider,
                history_median = h,
                realtime_median = r,
                ?correction,
                "Volume unit mismatch corrected"
            );
        }

        (history, realtime, correction)
    }

    fn medians(
        &self,
        history: &ProviderBatch,
        realtime: &ProviderBatch,
    ) -> (Option<f64>, Option<f64>) {
        let rt_stamps: HashSet<NaiveDateTime> =
            realtime.bars.iter().map(|b| b.timestamp).collect();
        let overlap: HashSet<NaiveDateTime> = history
            .bars
            .iter()
            .map(|b| b.timestamp)
            .filter(|ts| rt_stamps.contains(ts))
            .collect();

        if overlap.len() >= self.min_overlap {
            let pick = |batch: &ProviderBatch| {
                median_nonzero(
                    batch
                        .bars
                        .iter()
                        .filter(|b| overlap.contains(&b.timestamp))
                        .map(|b| b.volume),
                )
            };
            (pick(history), pick(realtime))
        } else {
            (
                median_nonzero(history.bars.iter().map(|b| b.volume)),
                median_nonzero(realtime.bars.iter().map(|b| b.volume)),
            )
        }
    }
}
