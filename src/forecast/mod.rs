//! Forecast Generator - evaluates a fitted decline over arbitrary time grids
//!
//! Uses the same `ArpsModel` equations the estimator fits with, so a
//! historical reconstruction at the observed times reproduces the
//! estimator's predictions exactly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decline::ArpsModel;
use crate::types::{DeclineParams, FitResult, ModelError, RateSeries, SeriesError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Forecast step must be finite and > 0 (got {0})")]
    InvalidStep(f64),

    #[error("Forecast horizon must be finite and >= 0 (got {0})")]
    InvalidHorizon(f64),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}

/// Model output at one time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub t: f64,
    pub rate: f64,
    /// Cumulative production since t = 0
    pub cumulative: f64,
    /// Effective annual decline at t
    pub effective_decline: f64,
}

/// Future extension of a fitted curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
    /// Time the curve reaches the abandonment rate, if within the horizon
    pub abandonment_time: Option<f64>,
    /// Cumulative production at abandonment or at the horizon end
    pub eur: f64,
}

/// Vectorized evaluation of one parameter set
#[derive(Debug, Clone, Copy)]
pub struct ForecastGenerator {
    model: ArpsModel,
}

impl ForecastGenerator {
    pub fn new(params: DeclineParams, periods_per_year: f64) -> Result<Self, ForecastError> {
        Ok(Self {
            model: ArpsModel::new(params, periods_per_year)?,
        })
    }

    pub fn from_fit(fit: &FitResult, periods_per_year: f64) -> Result<Self, ForecastError> {
        Self::new(fit.params, periods_per_year)
    }

    pub fn model(&self) -> &ArpsModel {
        &self.model
    }

    pub fn rates(&self, grid: &[f64]) -> Vec<f64> {
        self.model.rates(grid)
    }

    /// Rate, cumulative and decline at every grid time
    pub fn evaluate(&self, grid: &[f64]) -> Vec<ForecastPoint> {
        grid.iter()
            .map(|&t| ForecastPoint {
                t,
                rate: self.model.rate(t),
                cumulative: self.model.cumulative(t),
                effective_decline: self.model.effective_decline(t),
            })
            .collect()
    }

    /// Fitted rates at the observed times of `series`
    pub fn historical(&self, series: &RateSeries) -> Result<RateSeries, ForecastError> {
        Ok(series.with_rates(&self.rates(&series.times()))?)
    }

    /// Forecast from `from` to `from + horizon` every `step` periods.
    ///
    /// With an abandonment rate, points past the time the curve reaches it
    /// are dropped and EUR is the cumulative at that time.
    pub fn extend(
        &self,
        from: f64,
        horizon: f64,
        step: f64,
        abandonment_rate: Option<f64>,
    ) -> Result<Forecast, ForecastError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(ForecastError::InvalidStep(step));
        }
        if !horizon.is_finite() || horizon < 0.0 {
            return Err(ForecastError::InvalidHorizon(horizon));
        }

        let end = from + horizon;
        let abandonment_time = abandonment_rate
            .and_then(|q| self.model.time_to_rate(q))
            .filter(|&t| t <= end);
        let stop = abandonment_time.unwrap_or(end);

        let steps = (horizon / step).floor() as usize;
        let grid: Vec<f64> = (1..=steps)
            .map(|k| from + k as f64 * step)
            .take_while(|&t| t <= stop)
            .collect();

        Ok(Forecast {
            points: self.evaluate(&grid),
            abandonment_time,
            eur: self.model.cumulative(stop),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> ForecastGenerator {
        ForecastGenerator::new(DeclineParams::new(1000.0, 0.7, 0.08, 1.1).unwrap(), 12.0).unwrap()
    }

    #[test]
    fn test_evaluate_starts_at_qi() {
        let points = generator().evaluate(&[0.0, 12.0]);
        assert_eq!(points[0].rate, 1000.0);
        assert_eq!(points[0].cumulative, 0.0);
        assert!(points[1].rate < 1000.0);
    }

    #[test]
    fn test_extend_overlaps_historical() {
        let g = generator();
        let series = RateSeries::from_rates(&[1000.0, 900.0, 820.0, 760.0]).unwrap();
        let hist = g.historical(&series).unwrap();
        let forecast = g.extend(0.0, 3.0, 1.0, None).unwrap();
        for (p, h) in forecast.points.iter().zip(&hist.points()[1..]) {
            assert_eq!(p.rate, h.rate);
        }
    }

    #[test]
    fn test_extend_truncates_at_abandonment() {
        let g = generator();
        let forecast = g.extend(0.0, 1200.0, 1.0, Some(10.0)).unwrap();
        let t_ab = forecast.abandonment_time.unwrap();
        assert!(forecast.points.iter().all(|p| p.t <= t_ab));
        assert!((forecast.eur - g.model().cumulative(t_ab)).abs() < 1e-9);
        assert!(forecast.points.last().unwrap().rate >= 10.0 - 1e-9);
    }

    #[test]
    fn test_extend_rejects_bad_step() {
        assert!(matches!(
            generator().extend(0.0, 12.0, 0.0, None),
            Err(ForecastError::InvalidStep(_))
        ));
    }
}
