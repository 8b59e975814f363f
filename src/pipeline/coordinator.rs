//! Pipeline Coordinator - runs the stage sequence for single wells and batches
//!
//! Each well is independent: configuration is shared by reference and never
//! mutated, and every error is captured into that well's `WellOutcome`.

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{BatchReport, ConditioningSummary, WellOutcome, WellSeries, WellStatus};
use crate::conditioning::{ConditionedSeries, SignalConditioner};
use crate::config::DeclineConfig;
use crate::estimation::{EstimationError, ParameterEstimator};
use crate::forecast::{ForecastError, ForecastGenerator};
use crate::types::{Product, SeriesError};
use crate::validation::{FitValidator, ValidationError};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Series error: {0}")]
    Series(#[from] SeriesError),

    #[error("Estimation error: {0}")]
    Estimation(#[from] EstimationError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    #[error("No {0} wells to aggregate")]
    NoWells(Product),
}

impl PipelineError {
    /// Status a well ends in when this error stops it
    pub fn status(&self) -> WellStatus {
        match self {
            PipelineError::Estimation(
                EstimationError::InsufficientData { .. } | EstimationError::BelowAbandonment { .. },
            ) => WellStatus::Skipped,
            _ => WellStatus::Failed,
        }
    }
}

// ============================================================================
// Forecast settings
// ============================================================================

/// Optional forward forecast appended to each fitted well
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSettings {
    /// Periods past the last observed point
    pub horizon: f64,
    pub step: f64,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Conditioning → estimation → validation (→ forecast) for one configuration
#[derive(Debug, Clone, Copy)]
pub struct DeclinePipeline<'a> {
    config: &'a DeclineConfig,
    forecast: Option<ForecastSettings>,
}

impl<'a> DeclinePipeline<'a> {
    pub fn new(config: &'a DeclineConfig) -> Self {
        Self {
            config,
            forecast: None,
        }
    }

    /// Also forecast every fitted well `horizon` periods ahead
    pub fn with_forecast(mut self, horizon: f64, step: f64) -> Self {
        self.forecast = Some(ForecastSettings { horizon, step });
        self
    }

    pub fn config(&self) -> &DeclineConfig {
        self.config
    }

    /// Process one well. Never fails; errors become the outcome's status.
    pub fn process_well(&self, well: &WellSeries) -> WellOutcome {
        let mut outcome = WellOutcome::pending(well);
        match self.run_stages(well, &mut outcome) {
            Ok(()) => {
                outcome.status = WellStatus::Fitted;
                debug!(well_id = %well.well_id, product = %well.product, "Well fitted");
            }
            Err(e) => {
                outcome.status = e.status();
                match outcome.status {
                    WellStatus::Skipped => {
                        info!(well_id = %well.well_id, product = %well.product, reason = %e, "Well skipped")
                    }
                    _ => warn!(well_id = %well.well_id, product = %well.product, error = %e, "Well failed"),
                }
                outcome.diagnostics.push(e.to_string());
            }
        }
        outcome
    }

    /// Process every well in parallel. Outcomes keep input order.
    pub fn run_batch(&self, wells: &[WellSeries]) -> BatchReport {
        info!(wells = wells.len(), "Starting decline batch");
        let outcomes: Vec<WellOutcome> = wells.par_iter().map(|w| self.process_well(w)).collect();
        let report = BatchReport::new(outcomes);
        info!(
            total = report.summary.total,
            succeeded = report.summary.succeeded,
            skipped = report.summary.skipped,
            failed = report.summary.failed,
            flagged = report.summary.flagged,
            "Decline batch complete"
        );
        report
    }

    /// Stages 1-4. Intermediate results land in `outcome` as they are produced.
    fn run_stages(&self, well: &WellSeries, outcome: &mut WellOutcome) -> Result<(), PipelineError> {
        // Stage 1: conditioning
        let conditioned = SignalConditioner::condition(&well.series, &self.config.conditioning)?;
        outcome.conditioning = Some(summarize(well.series.len(), &conditioned));
        outcome.diagnostics.extend(
            conditioned
                .removed_outliers
                .iter()
                .map(|i| format!("Outlier removed at index {i}")),
        );

        // Stage 2: estimation
        let fit = ParameterEstimator::new(self.config).fit(well.product, &conditioned)?;
        outcome.fit = Some(fit.clone());

        // Stage 3: validation
        let product_config = self.config.product(well.product);
        let validator =
            FitValidator::new(&self.config.validation, self.config.fitting.periods_per_year);
        match validator.validate(&well.well_id, &conditioned.series, &fit, product_config.monotonicity) {
            Ok(report) => {
                outcome.diagnostics.extend(report.diagnostics());
                outcome.validation = Some(report);
            }
            Err(e) => {
                if let ValidationError::Failed { report, .. } = &e {
                    // errors are carried by the error message itself
                    outcome
                        .diagnostics
                        .extend(report.warnings.iter().map(|w| format!("WARNING: {w}")));
                    outcome.validation = Some(report.as_ref().clone());
                }
                return Err(e.into());
            }
        }

        // Stage 4: forecast
        if let Some(settings) = self.forecast {
            let generator = ForecastGenerator::from_fit(&fit, self.config.fitting.periods_per_year)?;
            let from = f64::from(conditioned.series.last().t);
            outcome.forecast = Some(generator.extend(
                from,
                settings.horizon,
                settings.step,
                Some(product_config.abandonment_rate),
            )?);
        }

        Ok(())
    }
}

fn summarize(input_points: usize, conditioned: &ConditionedSeries) -> ConditioningSummary {
    ConditioningSummary {
        input_points,
        series: conditioned.series.clone(),
        qi: conditioned.qi,
        removed_outliers: conditioned.removed_outliers.clone(),
        regimes: conditioned.regimes.len(),
        segment: conditioned.segment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decline::ArpsModel;
    use crate::types::{DeclineParams, RateSeries};

    fn decline_well(id: &str, qi: f64, n: u32) -> WellSeries {
        let model =
            ArpsModel::new(DeclineParams::new(qi, 0.6, 0.08, 1.0).unwrap(), 12.0).unwrap();
        let times: Vec<f64> = (0..n).map(f64::from).collect();
        WellSeries::new(
            id,
            Product::Oil,
            RateSeries::from_rates(&model.rates(&times)).unwrap(),
        )
    }

    #[test]
    fn test_process_clean_well() {
        let config = DeclineConfig::default();
        let outcome = DeclinePipeline::new(&config).process_well(&decline_well("W-1", 800.0, 36));
        assert_eq!(outcome.status, WellStatus::Fitted, "{:?}", outcome.diagnostics);
        let fit = outcome.fit.unwrap();
        let conditioning = outcome.conditioning.unwrap();
        assert_eq!(fit.params.qi, conditioning.qi.value());
        assert!(outcome.validation.unwrap().passed("time_starts_at_zero").unwrap());
    }

    #[test]
    fn test_short_well_is_skipped() {
        let config = DeclineConfig::default();
        let well = WellSeries::new("W-2", Product::Oil, RateSeries::from_rates(&[100.0, 90.0]).unwrap());
        let outcome = DeclinePipeline::new(&config).process_well(&well);
        assert_eq!(outcome.status, WellStatus::Skipped);
        assert!(outcome.fit.is_none());
        assert!(outcome.diagnostics[0].contains("Insufficient data"));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let config = DeclineConfig::default();
        let wells = vec![
            decline_well("A", 800.0, 36),
            WellSeries::new("B", Product::Gas, RateSeries::from_rates(&[5.0, 4.0, 3.5, 3.0]).unwrap()),
            decline_well("C", 300.0, 24),
        ];
        let report = DeclinePipeline::new(&config).run_batch(&wells);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.outcomes[0].well_id, "A");
        assert_eq!(report.outcomes[1].status, WellStatus::Skipped);
        assert_eq!(report.summary.succeeded, 2);
        assert_eq!(report.summary.skipped, 1);
    }

    #[test]
    fn test_forecast_attached_when_requested() {
        let config = DeclineConfig::default();
        let outcome = DeclinePipeline::new(&config)
            .with_forecast(24.0, 1.0)
            .process_well(&decline_well("W-3", 800.0, 36));
        let forecast = outcome.forecast.unwrap();
        let last_t = outcome.conditioning.unwrap().series.last().t;
        assert_eq!(forecast.points[0].t, f64::from(last_t) + 1.0);
        assert!(forecast.points.len() <= 24);
    }

    #[test]
    fn test_error_status_taxonomy() {
        let skipped = PipelineError::from(EstimationError::BelowAbandonment { qi: 1.0, limit: 10.0 });
        assert_eq!(skipped.status(), WellStatus::Skipped);
        let failed = PipelineError::from(EstimationError::NonConvergence {
            strategy: crate::types::StrategyKind::LeastSquares,
            iterations: 1,
            cost: 1.0,
        });
        assert_eq!(failed.status(), WellStatus::Failed);
    }
}
