//! Signal Conditioner - turns a raw rate series into a fit-ready regime
//!
//! Stages run in a fixed order, each producing a new series:
//!
//! 1. Outlier rejection (`outliers`): derivative-based, fail-open
//! 2. Change-point segmentation and regime selection (`changepoint`)
//! 3. Smoothing (`smoothing`): k passes of a centred 3-point mean
//! 4. Re-indexing so the first surviving sample has t = 0
//! 5. `FixedQi` taken from the first rate of the result
//!
//! Qi is read only after the last stage that touches rates, so it always
//! equals `series.first().rate` of the returned series.

pub mod changepoint;
pub mod outliers;
pub mod smoothing;

pub use changepoint::ChangepointDetector;
pub use outliers::{OutlierFilter, OutlierRejection};
pub use smoothing::moving_average;

use std::ops::Range;

use tracing::debug;

use crate::config::ConditioningConfig;
use crate::types::{FixedQi, RateSeries, Segment, SegmentRole, SeriesError};

/// Output of the conditioner
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedSeries {
    /// Selected, smoothed regime re-indexed to start at t = 0
    pub series: RateSeries,
    /// Rate at t = 0 of `series`
    pub qi: FixedQi,
    /// Every detected regime, as index ranges of the outlier-free series
    pub regimes: Vec<Range<usize>>,
    /// The regime that was kept
    pub segment: Segment,
    /// Indices of the input series removed as outliers
    pub removed_outliers: Vec<usize>,
}

/// Stateless conditioning pipeline
pub struct SignalConditioner;

impl SignalConditioner {
    /// Condition a raw series.
    ///
    /// A series already produced by this function with equal settings is
    /// returned unchanged.
    pub fn condition(
        series: &RateSeries,
        config: &ConditioningConfig,
    ) -> Result<ConditionedSeries, SeriesError> {
        if series.is_conditioned_with(config) {
            let len = series.len();
            return Ok(ConditionedSeries {
                series: series.clone(),
                qi: FixedQi::from_series(series),
                regimes: vec![0..len],
                segment: Segment::new(0, len, SegmentRole::All),
                removed_outliers: Vec::new(),
            });
        }

        // 1. Outliers
        let rejection = OutlierFilter::reject(series, &config.outliers);

        // 2. Regimes
        let regimes = ChangepointDetector::regimes(&rejection.series.rates(), &config.changepoint);
        let segment =
            ChangepointDetector::select(&regimes, config.segment_role, config.min_segment_length);
        let selected = rejection
            .series
            .slice(segment.range())
            .unwrap_or_else(|| rejection.series.clone());

        // 3. Smoothing
        let smoothed = if config.smoothing_factor > 0 {
            selected.with_rates(&moving_average(&selected.rates(), config.smoothing_factor))?
        } else {
            selected
        };

        // 4. Re-index, 5. Qi from the final rates
        let conditioned = smoothed.rebased().stamped(config);
        let qi = FixedQi::from_series(&conditioned);

        debug!(
            input_len = series.len(),
            output_len = conditioned.len(),
            outliers = rejection.removed.len(),
            regimes = regimes.len(),
            segment_start = segment.start,
            qi = %qi,
            "Series conditioned"
        );

        Ok(ConditionedSeries {
            series: conditioned,
            qi,
            regimes,
            segment,
            removed_outliers: rejection.removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChangepointConfig;

    fn decline(n: usize) -> Vec<f64> {
        (0..n).map(|t| 800.0 * (1.0 + 0.9 * 0.04 * t as f64).powf(-1.0 / 0.9)).collect()
    }

    #[test]
    fn test_qi_is_first_rate_after_smoothing() {
        let raw = RateSeries::from_rates(&decline(24)).unwrap();
        let out = SignalConditioner::condition(&raw, &ConditioningConfig::default()).unwrap();
        assert_eq!(out.qi.value(), out.series.first().rate);
        // Smoothing moved the first rate, so Qi is not the raw first rate
        assert_ne!(out.qi.value(), raw.first().rate);
        assert_eq!(out.series.first().t, 0);
    }

    #[test]
    fn test_idempotent_with_same_settings() {
        let mut rates = decline(30);
        rates[12] *= 2.5;
        let raw = RateSeries::from_rates(&rates).unwrap();
        let config = ConditioningConfig::default();
        let once = SignalConditioner::condition(&raw, &config).unwrap();
        let twice = SignalConditioner::condition(&once.series, &config).unwrap();
        assert_eq!(once.series, twice.series);
        assert_eq!(once.qi, twice.qi);
    }

    #[test]
    fn test_passthrough_keeps_raw_rates() {
        let raw = RateSeries::from_parts(&[5, 6, 7, 9], &[50.0, 45.0, 41.0, 35.0]).unwrap();
        let out = SignalConditioner::condition(&raw, &ConditioningConfig::passthrough()).unwrap();
        assert_eq!(out.series.rates(), raw.rates());
        assert_eq!(out.series.times(), vec![0.0, 1.0, 2.0, 4.0]);
        assert_eq!(out.qi.value(), 50.0);
    }

    #[test]
    fn test_outlier_gap_rebased() {
        let mut rates = decline(24);
        rates[0] *= 3.0;
        let raw = RateSeries::from_rates(&rates).unwrap();
        let config = ConditioningConfig {
            smoothing_factor: 0,
            ..ConditioningConfig::default()
        };
        let out = SignalConditioner::condition(&raw, &config).unwrap();
        assert_eq!(out.removed_outliers, vec![0]);
        assert_eq!(out.series.first().t, 0);
        assert_eq!(out.qi.value(), rates[1]);
    }

    #[test]
    fn test_ramp_up_excluded_with_last_regime() {
        let mut rates = vec![100.0, 300.0, 500.0, 700.0];
        rates.extend(decline(36));
        let raw = RateSeries::from_rates(&rates).unwrap();
        let config = ConditioningConfig {
            outliers: crate::config::OutlierConfig {
                enabled: false,
                ..Default::default()
            },
            changepoint: ChangepointConfig {
                enabled: true,
                ..Default::default()
            },
            smoothing_factor: 0,
            segment_role: SegmentRole::Last,
            min_segment_length: 12,
        };
        let out = SignalConditioner::condition(&raw, &config).unwrap();
        assert_eq!(out.segment.start, 4);
        assert_eq!(out.qi.value(), 800.0);
        assert_eq!(out.series.len(), 36);
    }
}
