//! Change-point segmentation of production regimes
//!
//! Regimes (ramp-up, decline, post-workover decline) show up as shifts in
//! the period-to-period log-rate step `ln q[i+1] - ln q[i]`. PELT (pruned
//! exact linear time) finds the optimal partition of those steps under an
//! L2 mean-shift cost plus a per-segment penalty scaled by a robust
//! (MAD-based) noise estimate.

use std::ops::Range;

use statrs::statistics::{Data, Median};
use tracing::debug;

use crate::config::ChangepointConfig;
use crate::types::{Segment, SegmentRole};

/// Scale from median absolute deviation to a normal standard deviation
const MAD_TO_SIGMA: f64 = 1.4826;

/// Stateless PELT detector
pub struct ChangepointDetector;

impl ChangepointDetector {
    /// Partition a series of rates into regimes.
    ///
    /// Always returns at least one range; ranges are ordered, contiguous and
    /// cover `0..rates.len()`.
    pub fn regimes(rates: &[f64], config: &ChangepointConfig) -> Vec<Range<usize>> {
        let n = rates.len();
        if !config.enabled || n < 3 {
            return vec![0..n];
        }

        let steps: Vec<f64> = rates.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let starts = Self::pelt(&steps, config);

        // A step boundary k starts a new regime at point k
        let mut bounds = Vec::with_capacity(starts.len() + 2);
        bounds.push(0);
        bounds.extend(starts);
        bounds.push(n);
        let regimes: Vec<Range<usize>> = bounds.windows(2).map(|w| w[0]..w[1]).collect();

        debug!(len = n, regimes = regimes.len(), "Change-point segmentation");
        regimes
    }

    /// Optimal change points of `x` (indices where a new segment starts)
    pub fn pelt(x: &[f64], config: &ChangepointConfig) -> Vec<usize> {
        let m = x.len();
        let min_size = config.min_segment_size.max(1);
        if m < 2 * min_size {
            return Vec::new();
        }

        let mut s1 = vec![0.0; m + 1];
        let mut s2 = vec![0.0; m + 1];
        for (i, v) in x.iter().enumerate() {
            s1[i + 1] = s1[i] + v;
            s2[i + 1] = s2[i] + v * v;
        }
        let cost = |a: usize, b: usize| {
            let len = (b - a) as f64;
            let sum = s1[b] - s1[a];
            (s2[b] - s2[a]) - sum * sum / len
        };

        let beta = config.penalty * Self::noise_variance(x).max(config.noise_floor);

        let mut best = vec![f64::INFINITY; m + 1];
        let mut last = vec![0usize; m + 1];
        best[0] = -beta;
        let mut candidates: Vec<usize> = vec![0];

        for t in min_size..=m {
            for &s in &candidates {
                if t - s < min_size {
                    continue;
                }
                let value = best[s] + cost(s, t) + beta;
                if value < best[t] {
                    best[t] = value;
                    last[t] = s;
                }
            }

            let bt = best[t];
            candidates.retain(|&s| t - s < min_size || best[s] + cost(s, t) <= bt);
            if bt.is_finite() {
                candidates.push(t);
            }
        }

        if !best[m].is_finite() {
            return Vec::new();
        }

        let mut starts = Vec::new();
        let mut t = m;
        while t > 0 {
            let s = last[t];
            if s > 0 {
                starts.push(s);
            }
            t = s;
        }
        starts.reverse();
        starts
    }

    /// (1.4826 · MAD)² of the steps
    fn noise_variance(x: &[f64]) -> f64 {
        let median = Data::new(x.to_vec()).median();
        let deviations: Vec<f64> = x.iter().map(|v| (v - median).abs()).collect();
        let mad = Data::new(deviations).median();
        (MAD_TO_SIGMA * mad).powi(2)
    }

    /// Pick the regime to fit.
    ///
    /// A regime shorter than `min_length` absorbs its neighbours (later ones
    /// for `First`, earlier ones for `Last`) until it is long enough. When the
    /// series itself is not longer than `min_length`, the whole series is used.
    pub fn select(regimes: &[Range<usize>], role: SegmentRole, min_length: usize) -> Segment {
        let start = regimes.first().map(|r| r.start).unwrap_or(0);
        let end = regimes.last().map(|r| r.end).unwrap_or(0);
        let whole = Segment::new(start, end, SegmentRole::All);

        if end - start <= min_length || regimes.len() < 2 {
            return whole;
        }

        match role {
            SegmentRole::All => whole,
            SegmentRole::First => {
                let seg_start = regimes[0].start;
                regimes
                    .iter()
                    .map(|r| r.end)
                    .find(|&e| e - seg_start >= min_length)
                    .map(|e| Segment::new(seg_start, e, SegmentRole::First))
                    .unwrap_or(whole)
            }
            SegmentRole::Last => {
                let seg_end = regimes[regimes.len() - 1].end;
                regimes
                    .iter()
                    .rev()
                    .map(|r| r.start)
                    .find(|&s| seg_end - s >= min_length)
                    .map(|s| Segment::new(s, seg_end, SegmentRole::Last))
                    .unwrap_or(whole)
            }
        }
    }
}
