//! Derivative-based outlier rejection in log-rate space
//!
//! Each sample is scored by how far `ln q` departs from the trend of its
//! neighbours (the nearest samples at least `window` periods away). On a
//! smooth decline the left and right log derivatives agree and the score is
//! near zero; a spike or dropout makes them disagree. Scores are z-scored
//! across the series and samples above `z_threshold` are removed. Surviving
//! samples keep their time indices.

use std::iter::successors;

use statrs::statistics::{Data, Median};
use tracing::{debug, warn};

use crate::config::OutlierConfig;
use crate::types::RateSeries;

/// Lower bound on the score spread used for z-scoring (log-rate units).
///
/// A noise-free curve has tiny but non-zero scores; without a floor the
/// largest of them would always look like an outlier.
pub const SCORE_SPREAD_FLOOR: f64 = 0.02;

/// Rejection outcome: the surviving series and the indices that were dropped
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierRejection {
    pub series: RateSeries,
    /// Indices into the input series, ascending
    pub removed: Vec<usize>,
}

impl OutlierRejection {
    fn unchanged(series: &RateSeries) -> Self {
        Self {
            series: series.clone(),
            removed: Vec::new(),
        }
    }
}

/// Stateless outlier filter
pub struct OutlierFilter;

impl OutlierFilter {
    /// Remove samples whose smoothness score exceeds the z threshold.
    ///
    /// Fails open: returns the input unchanged when rejection is disabled,
    /// the series is shorter than `min_array_size`, or every score is equal.
    pub fn reject(series: &RateSeries, config: &OutlierConfig) -> OutlierRejection {
        if !config.enabled {
            return OutlierRejection::unchanged(series);
        }
        if series.len() < config.min_array_size {
            debug!(
                len = series.len(),
                min_array_size = config.min_array_size,
                "Series too short for outlier rejection, skipping"
            );
            return OutlierRejection::unchanged(series);
        }

        let times = series.times();
        let log_rates: Vec<f64> = series.rates().iter().map(|q| q.ln()).collect();
        let scores = Self::scores(&times, &log_rates, config.window);

        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let spread = (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
        if !spread.is_finite() || spread == 0.0 {
            return OutlierRejection::unchanged(series);
        }
        let std = spread.max(SCORE_SPREAD_FLOOR);

        let removed: Vec<usize> = scores
            .iter()
            .enumerate()
            .filter(|(_, &s)| (s - mean) / std > config.z_threshold)
            .map(|(i, _)| i)
            .collect();

        if removed.is_empty() {
            return OutlierRejection::unchanged(series);
        }
        if series.len() - removed.len() < config.min_array_size {
            warn!(
                removed = removed.len(),
                len = series.len(),
                "Outlier rejection would leave too few samples, keeping input"
            );
            return OutlierRejection::unchanged(series);
        }

        debug!(removed = ?removed, "Outliers rejected");
        OutlierRejection {
            series: series.without_indices(&removed),
            removed,
        }
    }

    /// Smoothness score per sample in log-rate units.
    ///
    /// Interior samples are compared with the line through their neighbours,
    /// edge samples with the quadratic through the next three samples inward.
    /// The local median of neighbouring interior deviations is subtracted so
    /// steady curvature of a hyperbolic decline does not score.
    pub fn scores(times: &[f64], values: &[f64], window: f64) -> Vec<f64> {
        let deviations = Self::deviations(times, values, window);
        let n = deviations.len();
        (0..n)
            .map(|i| {
                let (deviation, edge) = deviations[i];
                if edge {
                    return deviation.abs();
                }
                let lo = i.saturating_sub(NEIGHBOURHOOD);
                let hi = (i + NEIGHBOURHOOD + 1).min(n);
                let neighbours: Vec<f64> = (lo..hi)
                    .filter(|&j| j != i && !deviations[j].1)
                    .map(|j| deviations[j].0)
                    .collect();
                if neighbours.is_empty() {
                    deviation.abs()
                } else {
                    (deviation - Data::new(neighbours).median()).abs()
                }
            })
            .collect()
    }

    /// Signed deviation from the neighbours' trend, and whether the trend
    /// was extrapolated (edge sample) rather than interpolated
    fn deviations(times: &[f64], values: &[f64], window: f64) -> Vec<(f64, bool)> {
        let n = values.len();
        let next = |from: usize| (from + 1..n).find(|&k| times[k] - times[from] >= window);
        let prev = |from: usize| (0..from).rev().find(|&j| times[from] - times[j] >= window);

        (0..n)
            .map(|i| {
                let (anchors, edge): (Vec<usize>, bool) = match (prev(i), next(i)) {
                    (Some(j), Some(k)) => (vec![j, k], false),
                    (None, Some(k)) => (successors(Some(k), |&m| next(m)).take(3).collect(), true),
                    (Some(j), None) => (successors(Some(j), |&m| prev(m)).take(3).collect(), true),
                    (None, None) => (Vec::new(), true),
                };
                if anchors.len() < 2 {
                    return (0.0, edge);
                }
                (values[i] - lagrange(times, values, &anchors, times[i]), edge)
            })
            .collect()
    }
}

/// Interior neighbours on each side used for the local median
const NEIGHBOURHOOD: usize = 2;

/// Polynomial through `(times[a], values[a])` for each anchor, evaluated at `t`
fn lagrange(times: &[f64], values: &[f64], anchors: &[usize], t: f64) -> f64 {
    anchors
        .iter()
        .map(|&a| {
            let basis: f64 = anchors
                .iter()
                .filter(|&&b| b != a)
                .map(|&b| (t - times[b]) / (times[a] - times[b]))
                .product();
            values[a] * basis
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decline(n: usize) -> Vec<f64> {
        (0..n).map(|t| 1000.0 * (1.0 + 0.9 * 0.05 * t as f64).powf(-1.0 / 0.9)).collect()
    }

    #[test]
    fn test_spike_is_removed() {
        let mut rates = decline(24);
        rates[10] *= 3.0;
        let series = RateSeries::from_rates(&rates).unwrap();
        let result = OutlierFilter::reject(&series, &OutlierConfig::default());
        assert_eq!(result.removed, vec![10]);
        assert_eq!(result.series.len(), 23);
        // Survivors keep their original time indices
        assert!(!result.series.times().contains(&10.0));
        assert!(result.series.times().contains(&11.0));
    }

    #[test]
    fn test_clean_decline_untouched() {
        let series = RateSeries::from_rates(&decline(24)).unwrap();
        let result = OutlierFilter::reject(&series, &OutlierConfig::default());
        assert!(result.removed.is_empty(), "removed {:?}", result.removed);
        assert_eq!(result.series, series);
    }

    #[test]
    fn test_first_point_spike_removed_alone() {
        let mut rates = decline(24);
        rates[0] *= 2.5;
        let series = RateSeries::from_rates(&rates).unwrap();
        let result = OutlierFilter::reject(&series, &OutlierConfig::default());
        assert_eq!(result.removed, vec![0]);
        assert_eq!(result.series.first().t, 1);
    }

    #[test]
    fn test_short_series_fails_open() {
        let series = RateSeries::from_rates(&[100.0, 300.0, 90.0]).unwrap();
        let result = OutlierFilter::reject(&series, &OutlierConfig::default());
        assert_eq!(result.series, series);
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_flat_series_fails_open() {
        let series = RateSeries::from_rates(&[100.0; 12]).unwrap();
        let result = OutlierFilter::reject(&series, &OutlierConfig::default());
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_disabled_returns_input() {
        let mut rates = decline(24);
        rates[5] *= 4.0;
        let series = RateSeries::from_rates(&rates).unwrap();
        let config = OutlierConfig {
            enabled: false,
            ..OutlierConfig::default()
        };
        assert_eq!(OutlierFilter::reject(&series, &config).series, series);
    }

    #[test]
    fn test_scores_zero_on_log_linear() {
        let times: Vec<f64> = (0..8).map(f64::from).collect();
        let values: Vec<f64> = times.iter().map(|t| 5.0 - 0.1 * t).collect();
        let scores = OutlierFilter::scores(&times, &values, 1.0);
        assert!(scores.iter().all(|s| s.abs() < 1e-12));
    }
}
