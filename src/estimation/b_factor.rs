//! Loss-ratio b-factor estimation
//!
//! The Arps loss ratio `a = -q / (dq/dt)` grows linearly with slope `b` on a
//! hyperbolic decline. Differentiating it numerically gives a point estimate
//! of b per sample; the median becomes the initial guess and the quartiles
//! become the search bounds, all clamped to the configured range.

use statrs::statistics::{Data, Median, OrderStatistics};
use tracing::debug;

use crate::types::RateSeries;

/// Fewest finite point estimates needed for a usable b range
const MIN_ESTIMATES: usize = 3;

/// b range derived from the data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BEstimate {
    pub low: f64,
    pub guess: f64,
    pub high: f64,
}

/// Central-difference derivative with one-sided ends (uneven spacing allowed)
fn gradient(t: &[f64], y: &[f64]) -> Vec<f64> {
    let n = y.len();
    (0..n)
        .map(|i| match i {
            0 => (y[1] - y[0]) / (t[1] - t[0]),
            i if i == n - 1 => (y[i] - y[i - 1]) / (t[i] - t[i - 1]),
            i => (y[i + 1] - y[i - 1]) / (t[i + 1] - t[i - 1]),
        })
        .collect()
}

/// Estimate b from the loss-ratio derivative.
///
/// Returns None when `min_b..=max_b` is empty, or when the series is too
/// short or does not decline enough to produce `MIN_ESTIMATES` finite values.
pub fn estimate(series: &RateSeries, min_b: f64, max_b: f64) -> Option<BEstimate> {
    if min_b.is_nan() || max_b.is_nan() || min_b > max_b || series.len() < MIN_ESTIMATES + 1 {
        return None;
    }
    let t = series.times();
    let q = series.rates();

    let dq = gradient(&t, &q);
    let loss_ratio: Vec<f64> = q.iter().zip(&dq).map(|(q, d)| -q / d).collect();
    let b_points: Vec<f64> = gradient(&t, &loss_ratio)
        .into_iter()
        .zip(&dq)
        // Only declining samples carry a meaningful loss ratio
        .filter(|(b, d)| **d < 0.0 && b.is_finite())
        .map(|(b, _)| b)
        .collect();

    if b_points.len() < MIN_ESTIMATES {
        debug!(estimates = b_points.len(), "Too few loss-ratio estimates for b");
        return None;
    }

    let mut data = Data::new(b_points);
    let estimate = BEstimate {
        low: data.lower_quartile().clamp(min_b, max_b),
        guess: data.median().clamp(min_b, max_b),
        high: data.upper_quartile().clamp(min_b, max_b),
    };
    debug!(low = estimate.low, guess = estimate.guess, high = estimate.high, "Estimated b range");
    Some(estimate)
}
