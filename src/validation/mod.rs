//! Fit Validator - invariant checks on (series, fit, predictions)
//!
//! A single pass of six independent, side-effect-free checks:
//!
//! 1. `time_starts_at_zero`: the conditioned series starts at t = 0
//! 2. `first_point_alignment`: pred(0) matches actual(0), i.e. Qi was not fitted
//! 3. `decline_trend`: predictions follow the product's monotonicity policy
//! 4. `goodness_of_fit`: R² above the minimum (advisory below the desired level)
//! 5. `parameter_reasonableness`: Qi > 0, Dei and b in range, Dei >= Def
//! 6. `residual_analysis`: no systematic bias in the residuals
//!
//! A constant observed series has no variance to explain. Its R² is taken
//! about zero (see `GoodnessOfFit::compute`), and any residual bias is only
//! advisory: with Dei bounded below by Def, a declining curve cannot sit on
//! a flat series without a one-sided residual.
//!
//! Non-strict mode reports failures as warnings. Strict mode reports them as
//! errors and returns `ValidationError::Failed`, which aborts only the well
//! being validated.

use statrs::statistics::Statistics;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{MonotonicityPolicy, ValidationConfig};
use crate::decline::B_EPS;
use crate::forecast::{ForecastError, ForecastGenerator};
use crate::types::{FitResult, GoodnessOfFit, Product, RateSeries, ValidationReport, MAX_B};

pub const TIME_STARTS_AT_ZERO: &str = "time_starts_at_zero";
pub const FIRST_POINT_ALIGNMENT: &str = "first_point_alignment";
pub const DECLINE_TREND: &str = "decline_trend";
pub const GOODNESS_OF_FIT: &str = "goodness_of_fit";
pub const PARAMETER_REASONABLENESS: &str = "parameter_reasonableness";
pub const RESIDUAL_ANALYSIS: &str = "residual_analysis";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Fit validation failed for well {well_id} {product}: {}", errors.join("; "))]
    Failed {
        well_id: String,
        product: Product,
        failed_checks: Vec<String>,
        errors: Vec<String>,
        report: Box<ValidationReport>,
    },

    #[error("Could not reconstruct predictions: {0}")]
    Forecast(#[from] ForecastError),
}

/// Outcome of a single check
struct Check {
    passed: bool,
    /// Failure diagnostics (routed to errors or warnings by mode)
    failures: Vec<String>,
    /// Advisory diagnostics (always warnings)
    advisories: Vec<String>,
}

impl Check {
    fn pass() -> Self {
        Self {
            passed: true,
            failures: Vec::new(),
            advisories: Vec::new(),
        }
    }

    fn fail(message: String) -> Self {
        Self {
            passed: false,
            failures: vec![message],
            advisories: Vec::new(),
        }
    }

    fn advise(message: String) -> Self {
        Self {
            passed: true,
            failures: Vec::new(),
            advisories: vec![message],
        }
    }
}

/// Stateless validator for one configuration
pub struct FitValidator<'a> {
    config: &'a ValidationConfig,
    periods_per_year: f64,
}

impl<'a> FitValidator<'a> {
    pub fn new(config: &'a ValidationConfig, periods_per_year: f64) -> Self {
        Self {
            config,
            periods_per_year,
        }
    }

    /// Run all checks on a fit of `series`.
    ///
    /// Predictions are regenerated from the fitted parameters at the
    /// series' own time indices rather than trusted from the fit.
    pub fn validate(
        &self,
        well_id: &str,
        series: &RateSeries,
        fit: &FitResult,
        policy: MonotonicityPolicy,
    ) -> Result<ValidationReport, ValidationError> {
        let predicted = ForecastGenerator::from_fit(fit, self.periods_per_year)?
            .historical(series)?
            .rates();
        let actual = series.rates();
        let goodness = GoodnessOfFit::compute(&actual, &predicted);
        let first_point_error_pct =
            (predicted[0] - actual[0]).abs() / actual[0] * 100.0;

        let checks = [
            (TIME_STARTS_AT_ZERO, self.check_time_zero(series)),
            (
                FIRST_POINT_ALIGNMENT,
                self.check_first_point(actual[0], predicted[0], first_point_error_pct),
            ),
            (DECLINE_TREND, self.check_trend(&predicted, policy)),
            (GOODNESS_OF_FIT, self.check_goodness(goodness.r2)),
            (PARAMETER_REASONABLENESS, Self::check_parameters(fit)),
            (RESIDUAL_ANALYSIS, self.check_residuals(&actual, &predicted, series.mean_rate())),
        ];

        let mut report = ValidationReport {
            overall_pass: true,
            first_point_error_pct: Some(first_point_error_pct),
            r2: Some(goodness.r2),
            ..ValidationReport::default()
        };
        for (name, check) in checks {
            report.test_results.insert(name.to_string(), check.passed);
            report.overall_pass &= check.passed;
            if self.config.strict {
                report.errors.extend(check.failures);
            } else {
                report.warnings.extend(check.failures);
            }
            report.warnings.extend(check.advisories);
        }

        for w in &report.warnings {
            warn!(well_id, product = %fit.product, "{}", w);
        }
        debug!(
            well_id,
            product = %fit.product,
            overall_pass = report.overall_pass,
            failed = ?report.failed_checks(),
            "Fit validated"
        );

        if self.config.strict && !report.overall_pass {
            return Err(ValidationError::Failed {
                well_id: well_id.to_string(),
                product: fit.product,
                failed_checks: report.failed_checks(),
                errors: report.errors.clone(),
                report: Box::new(report),
            });
        }
        Ok(report)
    }

    // ========================================================================
    // Checks
    // ========================================================================

    fn check_time_zero(&self, series: &RateSeries) -> Check {
        let t0 = series.first().t;
        if f64::from(t0).abs() > self.config.time_zero_tolerance {
            Check::fail(format!(
                "Time-zero alignment: series starts at t={t0}, expected 0 (q(0) = Qi does not hold)"
            ))
        } else {
            Check::pass()
        }
    }

    fn check_first_point(&self, actual: f64, predicted: f64, error_pct: f64) -> Check {
        if error_pct > self.config.first_point_warning_pct {
            Check::fail(format!(
                "First-point alignment: q_pred(0)={predicted:.2}, q_actual(0)={actual:.2}, error={error_pct:.1}% exceeds {:.1}%",
                self.config.first_point_warning_pct
            ))
        } else if error_pct > self.config.first_point_good_pct {
            Check::advise(format!(
                "First-point alignment acceptable but not ideal: error={error_pct:.1}%"
            ))
        } else {
            Check::pass()
        }
    }

    fn check_trend(&self, predicted: &[f64], policy: MonotonicityPolicy) -> Check {
        let tol = self.config.monotonic_tolerance;
        let violations = match policy {
            MonotonicityPolicy::Skip => return Check::pass(),
            MonotonicityPolicy::Decline => predicted
                .windows(2)
                .filter(|w| w[1] > w[0] * (1.0 + tol))
                .count(),
            MonotonicityPolicy::Incline => predicted
                .windows(2)
                .filter(|w| w[1] < w[0] * (1.0 - tol))
                .count(),
        };
        if violations > 0 {
            let expected = match policy {
                MonotonicityPolicy::Incline => "monotonic incline",
                _ => "monotonic decline",
            };
            Check::fail(format!(
                "Decline trend: predicted rates reversed at {violations} points (expected {expected})"
            ))
        } else {
            Check::pass()
        }
    }

    fn check_goodness(&self, r2: f64) -> Check {
        if r2 < self.config.r2_minimum {
            Check::fail(format!(
                "Goodness of fit: R²={r2:.3} below minimum {:.2}",
                self.config.r2_minimum
            ))
        } else if r2 < self.config.r2_desired {
            Check::advise(format!(
                "Goodness of fit acceptable: R²={r2:.3} (good fit is >= {:.2})",
                self.config.r2_desired
            ))
        } else {
            Check::pass()
        }
    }

    fn check_parameters(fit: &FitResult) -> Check {
        let p = &fit.params;
        let mut issues = Vec::new();
        if p.qi <= 0.0 {
            issues.push(format!("Qi={:.2} must be positive", p.qi));
        }
        if !(0.0..=1.0).contains(&p.dei) {
            issues.push(format!("Dei={:.4} outside [0, 1]", p.dei));
        }
        if !(0.0..=MAX_B).contains(&p.b) {
            issues.push(format!("b={:.4} outside [0, {MAX_B}]", p.b));
        }
        // Def plays no part in a pure exponential
        if p.b >= B_EPS && p.dei < p.def {
            issues.push(format!(
                "Dei={:.4} < Def={:.4} (initial decline should exceed terminal)",
                p.dei, p.def
            ));
        }

        if issues.is_empty() {
            Check::pass()
        } else {
            Check {
                passed: false,
                failures: issues
                    .into_iter()
                    .map(|i| format!("Parameter reasonableness: {i}"))
                    .collect(),
                advisories: Vec::new(),
            }
        }
    }

    fn check_residuals(&self, actual: &[f64], predicted: &[f64], mean_rate: f64) -> Check {
        let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
        let mean = residuals.iter().mean();
        let std = residuals.iter().population_std_dev();

        let biased = mean.abs() > self.config.residual_bias_ratio * std
            && mean.abs() > self.config.residual_bias_floor * mean_rate;
        if !biased {
            Check::pass()
        } else if GoodnessOfFit::is_constant(actual) {
            Check::advise(format!(
                "Residual analysis: observed rates are constant, mean residual={mean:.2} reflects the imposed decline"
            ))
        } else {
            Check::fail(format!(
                "Residual analysis: systematic bias, mean residual={mean:.2}, std={std:.2}"
            ))
        }
    }
}
