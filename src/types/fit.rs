//! Fit output types: GoodnessOfFit, FitResult, ValidationReport

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DeclineParams, FixedQi, Product, RateSeries, Segment};

/// Variance (relative to the mean square) below which a series counts as constant
const CONSTANT_SERIES_TOLERANCE: f64 = 1e-12;

/// Search strategy used to fit `(Dei, b)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Bounded least squares from one initial guess
    #[default]
    LeastSquares,
    /// Least squares from many randomized starting points
    MonteCarlo,
    /// Global stochastic search
    DifferentialEvolution,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::LeastSquares => write!(f, "least_squares"),
            StrategyKind::MonteCarlo => write!(f, "monte_carlo"),
            StrategyKind::DifferentialEvolution => write!(f, "differential_evolution"),
        }
    }
}

/// How many parameters were free during the fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitKind {
    /// Dei and b both fitted
    Full,
    /// Short series: b pinned at its guess, only Dei fitted
    DeiOnly,
}

/// R², RMSE and MAE of predicted vs observed rates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoodnessOfFit {
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
}

impl GoodnessOfFit {
    /// Compute metrics over paired slices (extra elements are ignored)
    ///
    /// A constant series has no variance to explain, so its R² is taken
    /// about zero instead of about the mean: `1 - SSres / Σ actual²`.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self {
                r2: 0.0,
                rmse: 0.0,
                mae: 0.0,
            };
        }
        let actual = &actual[..n];
        let predicted = &predicted[..n];

        let mean = actual.iter().sum::<f64>() / n as f64;
        let ss_res: f64 = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).powi(2))
            .sum();
        let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        let abs_sum: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();

        let ss_raw: f64 = actual.iter().map(|a| a * a).sum();

        let r2 = if ss_tot > CONSTANT_SERIES_TOLERANCE * ss_raw {
            1.0 - ss_res / ss_tot
        } else if ss_raw > 0.0 {
            1.0 - ss_res / ss_raw
        } else {
            0.0
        };

        Self {
            r2,
            rmse: (ss_res / n as f64).sqrt(),
            mae: abs_sum / n as f64,
        }
    }

    /// True when the values have no variance worth explaining
    pub fn is_constant(values: &[f64]) -> bool {
        if values.is_empty() {
            return true;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let ss_tot: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        let ss_raw: f64 = values.iter().map(|v| v * v).sum();
        ss_tot <= CONSTANT_SERIES_TOLERANCE * ss_raw
    }
}

/// Result of fitting one conditioned series. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    pub product: Product,
    /// Full parameter set; `params.qi` always equals `qi_candidate`
    pub params: DeclineParams,
    /// Boundary condition taken from the conditioned series
    pub qi_candidate: FixedQi,
    /// Model rates at the observed time indices
    pub predicted: RateSeries,
    pub goodness: GoodnessOfFit,
    /// Periods after which the curve follows the terminal exponential
    pub transition_time: Option<f64>,
    pub strategy: StrategyKind,
    pub fit_kind: FitKind,
    /// Segment of the conditioned series that was fitted
    pub segment: Option<Segment>,
    /// Objective evaluations spent by the optimizer
    pub evaluations: usize,
}

/// Outcome of the fit validator's checks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub overall_pass: bool,
    /// Check name → pass/fail, in a stable order
    pub test_results: BTreeMap<String, bool>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    /// |pred(0) - actual(0)| / actual(0) in percent
    pub first_point_error_pct: Option<f64>,
    pub r2: Option<f64>,
}

impl ValidationReport {
    /// Names of checks that failed
    pub fn failed_checks(&self) -> Vec<String> {
        self.test_results
            .iter()
            .filter(|(_, &passed)| !passed)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn passed(&self, check: &str) -> Option<bool> {
        self.test_results.get(check).copied()
    }

    /// Every diagnostic line, errors first
    pub fn diagnostics(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("ERROR: {e}"))
            .chain(self.warnings.iter().map(|w| format!("WARNING: {w}")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goodness_perfect_fit() {
        let actual = [10.0, 8.0, 6.0];
        let gof = GoodnessOfFit::compute(&actual, &actual);
        assert!((gof.r2 - 1.0).abs() < 1e-12);
        assert_eq!(gof.rmse, 0.0);
        assert_eq!(gof.mae, 0.0);
    }

    #[test]
    fn test_goodness_flat_series() {
        let actual = [100.0; 5];
        assert!(GoodnessOfFit::is_constant(&actual));
        assert_eq!(GoodnessOfFit::compute(&actual, &actual).r2, 1.0);
        // 1 - 500 / 50000
        let near = GoodnessOfFit::compute(&actual, &[90.0; 5]);
        assert!((near.r2 - 0.99).abs() < 1e-12, "{near:?}");
        let steep = GoodnessOfFit::compute(&actual, &[100.0, 50.0, 25.0, 12.5, 6.25]);
        assert!(steep.r2 < 0.6, "{steep:?}");
    }

    #[test]
    fn test_rounding_noise_counts_as_constant() {
        let third = 0.1 + 0.1 + 0.1;
        assert!(GoodnessOfFit::is_constant(&[0.3, third, 0.3]));
        assert!(!GoodnessOfFit::is_constant(&[100.0, 99.0, 100.0]));
    }

    #[test]
    fn test_goodness_known_values() {
        let gof = GoodnessOfFit::compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]);
        // ss_res = 1, ss_tot = 2
        assert!((gof.r2 - 0.5).abs() < 1e-12);
        assert!((gof.rmse - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((gof.mae - 1.0 / 3.0).abs() < 1e-12);
    }
}
