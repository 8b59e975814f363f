//! Rate series types: RatePoint, RateSeries, Segment, FixedQi

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

use crate::config::ConditioningConfig;

/// Errors raised when constructing a rate series
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("Rate series is empty")]
    Empty,

    #[error("Time indices must be strictly increasing (t[{index}]={current} follows {previous})")]
    NonIncreasingTime {
        index: usize,
        previous: u32,
        current: u32,
    },

    #[error("Rate at t={t} must be finite and > 0 (got {rate})")]
    InvalidRate { t: u32, rate: f64 },

    #[error("Rates length {rates} does not match times length {times}")]
    LengthMismatch { times: usize, rates: usize },
}

/// One production period: relative period counter and rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    /// Relative period index (not a calendar date)
    pub t: u32,
    /// Production rate for the period (> 0)
    pub rate: f64,
}

impl RatePoint {
    pub fn new(t: u32, rate: f64) -> Self {
        Self { t, rate }
    }
}

/// Time-ordered production rate series.
///
/// Invariants enforced at construction:
/// - at least one point
/// - strictly increasing time indices
/// - every rate finite and > 0
///
/// A series is never mutated once built. Each conditioning stage produces a
/// new series; the last stage stamps it with the settings that produced it.
///
/// An unstamped series serializes as a plain array of points. A stamped one
/// serializes as `{ "points": [...], "conditioned_with": {...} }`, so the
/// stamp survives a JSON round trip. Either form deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesRepr", into = "SeriesRepr")]
pub struct RateSeries {
    points: Vec<RatePoint>,
    conditioned_with: Option<ConditioningConfig>,
}

impl RateSeries {
    /// Build a series from points, validating ordering and rates
    pub fn new(points: Vec<RatePoint>) -> Result<Self, SeriesError> {
        if points.is_empty() {
            return Err(SeriesError::Empty);
        }

        for (i, p) in points.iter().enumerate() {
            if !p.rate.is_finite() || p.rate <= 0.0 {
                return Err(SeriesError::InvalidRate { t: p.t, rate: p.rate });
            }
            if i > 0 && p.t <= points[i - 1].t {
                return Err(SeriesError::NonIncreasingTime {
                    index: i,
                    previous: points[i - 1].t,
                    current: p.t,
                });
            }
        }

        Ok(Self {
            points,
            conditioned_with: None,
        })
    }

    /// Build a series with consecutive time indices 0..n
    pub fn from_rates(rates: &[f64]) -> Result<Self, SeriesError> {
        let points = rates
            .iter()
            .enumerate()
            .map(|(i, &rate)| RatePoint::new(i as u32, rate))
            .collect();
        Self::new(points)
    }

    /// Build a series from parallel time and rate slices
    pub fn from_parts(times: &[u32], rates: &[f64]) -> Result<Self, SeriesError> {
        if times.len() != rates.len() {
            return Err(SeriesError::LengthMismatch {
                times: times.len(),
                rates: rates.len(),
            });
        }
        let points = times
            .iter()
            .zip(rates)
            .map(|(&t, &rate)| RatePoint::new(t, rate))
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a constructed series; kept for API symmetry
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[RatePoint] {
        &self.points
    }

    /// First point (the series is never empty)
    pub fn first(&self) -> RatePoint {
        self.points[0]
    }

    pub fn last(&self) -> RatePoint {
        self.points[self.points.len() - 1]
    }

    /// Time indices as f64, ready for model evaluation
    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|p| f64::from(p.t)).collect()
    }

    pub fn rates(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.rate).collect()
    }

    /// Sub-series over an index range. Returns None for an empty range.
    pub fn slice(&self, range: Range<usize>) -> Option<Self> {
        let points = self.points.get(range)?.to_vec();
        if points.is_empty() {
            return None;
        }
        Some(Self {
            points,
            conditioned_with: None,
        })
    }

    /// Keep only points whose index is not listed in `removed` (sorted or not)
    pub fn without_indices(&self, removed: &[usize]) -> Self {
        let points: Vec<RatePoint> = self
            .points
            .iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(i))
            .map(|(_, p)| *p)
            .collect();
        if points.is_empty() {
            return self.clone();
        }
        Self {
            points,
            conditioned_with: None,
        }
    }

    /// Same series shifted so the first point has t = 0.
    ///
    /// The conditioning stamp is kept only when no shift was needed.
    pub fn rebased(&self) -> Self {
        let t0 = self.points[0].t;
        if t0 == 0 {
            return self.clone();
        }
        Self {
            points: self
                .points
                .iter()
                .map(|p| RatePoint::new(p.t - t0, p.rate))
                .collect(),
            conditioned_with: None,
        }
    }

    /// Same time indices with replacement rates
    pub fn with_rates(&self, rates: &[f64]) -> Result<Self, SeriesError> {
        if rates.len() != self.points.len() {
            return Err(SeriesError::LengthMismatch {
                times: self.points.len(),
                rates: rates.len(),
            });
        }
        let points = self
            .points
            .iter()
            .zip(rates)
            .map(|(p, &rate)| RatePoint::new(p.t, rate))
            .collect();
        Self::new(points)
    }

    /// Stamp the series with the conditioning settings that produced it
    pub(crate) fn stamped(mut self, settings: &ConditioningConfig) -> Self {
        self.conditioned_with = Some(settings.clone());
        self
    }

    /// True when this series came out of the conditioner with these settings
    pub fn is_conditioned_with(&self, settings: &ConditioningConfig) -> bool {
        self.first().t == 0 && self.conditioned_with.as_ref() == Some(settings)
    }

    pub fn is_conditioned(&self) -> bool {
        self.conditioned_with.is_some()
    }

    /// Arithmetic mean of the rates
    pub fn mean_rate(&self) -> f64 {
        self.points.iter().map(|p| p.rate).sum::<f64>() / self.points.len() as f64
    }
}

/// Wire form of `RateSeries`
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SeriesRepr {
    Points(Vec<RatePoint>),
    Conditioned {
        points: Vec<RatePoint>,
        conditioned_with: ConditioningConfig,
    },
}

impl TryFrom<SeriesRepr> for RateSeries {
    type Error = SeriesError;

    fn try_from(repr: SeriesRepr) -> Result<Self, Self::Error> {
        match repr {
            SeriesRepr::Points(points) => Self::new(points),
            SeriesRepr::Conditioned {
                points,
                conditioned_with,
            } => Ok(Self::new(points)?.stamped(&conditioned_with)),
        }
    }
}

impl From<RateSeries> for SeriesRepr {
    fn from(series: RateSeries) -> Self {
        match series.conditioned_with {
            None => SeriesRepr::Points(series.points),
            Some(conditioned_with) => SeriesRepr::Conditioned {
                points: series.points,
                conditioned_with,
            },
        }
    }
}

impl TryFrom<Vec<RatePoint>> for RateSeries {
    type Error = SeriesError;

    fn try_from(points: Vec<RatePoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

// ============================================================================
// Segments
// ============================================================================

/// Which regime of a segmented series to fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentRole {
    /// Earliest regime
    First,
    /// Most recent regime
    Last,
    /// No segmentation, the whole series
    #[default]
    All,
}

impl std::fmt::Display for SegmentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentRole::First => write!(f, "first"),
            SegmentRole::Last => write!(f, "last"),
            SegmentRole::All => write!(f, "all"),
        }
    }
}

/// Contiguous index range `[start, end)` of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub role: SegmentRole,
}

impl Segment {
    pub fn new(start: usize, end: usize, role: SegmentRole) -> Self {
        Self { start, end, role }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

// ============================================================================
// Fixed initial rate
// ============================================================================

/// Rate at t = 0: a boundary condition measured from data, never fitted.
///
/// Outside this crate the only way to obtain one is from the first point of
/// a series. It serializes for reports but never deserializes. The optimizer
/// works on `DeclineVector`, which has no slot for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FixedQi(f64);

impl FixedQi {
    /// Take Qi from the first point of the (fully conditioned) series
    pub fn from_series(series: &RateSeries) -> Self {
        Self(series.first().rate)
    }

    /// Qi from a known value, for hand-built fits in tests
    #[cfg(test)]
    pub(crate) fn measured(rate: f64) -> Option<Self> {
        (rate.is_finite() && rate > 0.0).then_some(Self(rate))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for FixedQi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_increasing_time() {
        let err = RateSeries::from_parts(&[0, 2, 2], &[10.0, 9.0, 8.0]).unwrap_err();
        assert!(matches!(err, SeriesError::NonIncreasingTime { index: 2, .. }));
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        assert!(RateSeries::from_rates(&[10.0, 0.0]).is_err());
        assert!(RateSeries::from_rates(&[10.0, f64::NAN]).is_err());
        assert_eq!(RateSeries::from_rates(&[]).unwrap_err(), SeriesError::Empty);
    }

    #[test]
    fn test_rebased_starts_at_zero() {
        let series = RateSeries::from_parts(&[3, 4, 6], &[10.0, 9.0, 8.0]).unwrap();
        let rebased = series.rebased();
        assert_eq!(rebased.times(), vec![0.0, 1.0, 3.0]);
        assert_eq!(rebased.rates(), series.rates());
    }

    #[test]
    fn test_shifting_rebase_drops_stamp() {
        let settings = ConditioningConfig::default();
        let at_zero = RateSeries::from_rates(&[10.0, 9.0, 8.0]).unwrap().stamped(&settings);
        assert!(at_zero.rebased().is_conditioned_with(&settings));

        let shifted = RateSeries::from_parts(&[3, 4, 6], &[10.0, 9.0, 8.0])
            .unwrap()
            .stamped(&settings);
        assert!(!shifted.is_conditioned_with(&settings));
        let rebased = shifted.rebased();
        assert_eq!(rebased.first().t, 0);
        assert!(!rebased.is_conditioned());
    }

    #[test]
    fn test_without_indices_keeps_gaps() {
        let series = RateSeries::from_rates(&[10.0, 50.0, 8.0, 7.0]).unwrap();
        let cleaned = series.without_indices(&[1]);
        assert_eq!(cleaned.times(), vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let json = r#"[{"t":0,"rate":5.0},{"t":1,"rate":4.0}]"#;
        let series: RateSeries = serde_json::from_str(json).unwrap();
        assert_eq!(series.len(), 2);

        let bad = r#"[{"t":1,"rate":5.0},{"t":0,"rate":4.0}]"#;
        assert!(serde_json::from_str::<RateSeries>(bad).is_err());
    }

    #[test]
    fn test_stamp_survives_serde() {
        let settings = ConditioningConfig::passthrough();
        let plain = RateSeries::from_rates(&[5.0, 4.0, 3.5]).unwrap();
        assert!(serde_json::to_string(&plain).unwrap().starts_with('['));

        let stamped = plain.stamped(&settings);
        let json = serde_json::to_string(&stamped).unwrap();
        let back: RateSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stamped);
        assert!(back.is_conditioned_with(&settings));

        let bad = r#"{"points":[{"t":0,"rate":-1.0}],"conditioned_with":{}}"#;
        assert!(serde_json::from_str::<RateSeries>(bad).is_err());
    }

    #[test]
    fn test_fixed_qi_from_first_point() {
        let series = RateSeries::from_rates(&[19.5, 30.0, 18.0]).unwrap();
        assert_eq!(FixedQi::from_series(&series).value(), 19.5);
        assert!(FixedQi::measured(-1.0).is_none());
    }

    #[test]
    fn test_fixed_qi_serializes_as_rate() {
        let series = RateSeries::from_rates(&[19.5, 18.0]).unwrap();
        let qi = FixedQi::from_series(&series);
        assert_eq!(serde_json::to_string(&qi).unwrap(), "19.5");
    }
}
