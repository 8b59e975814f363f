//! Parameter Estimator - fits (Dei, b) with Qi fixed from data
//!
//! The optimizer's parameter vector (`DeclineVector`) has exactly two
//! degrees of freedom. `Qi` arrives as a `FixedQi` boundary condition and
//! `Def` comes from product configuration; both are baked into the
//! `DeclineObjective` before any search starts.
//!
//! ## Key Features
//! - Three interchangeable strategies behind `FitStrategy`: bounded
//!   Levenberg–Marquardt, Monte Carlo restarts, differential evolution
//! - Explicit `NonConvergence` failure instead of a best-effort guess
//! - Reduced fit for short series (b pinned, only Dei fitted)
//! - Optional loss-ratio b estimation and robust-strategy retry
//! - Abandonment guard: wells already below the economic limit are skipped

pub mod b_factor;
pub mod differential_evolution;
pub mod least_squares;
pub mod monte_carlo;
pub mod objective;

pub use differential_evolution::{DeOptions, DifferentialEvolution};
pub use least_squares::{LevenbergMarquardt, LmOptions};
pub use monte_carlo::MonteCarlo;
pub use objective::DeclineObjective;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::conditioning::ConditionedSeries;
use crate::config::{DeclineConfig, FittingConfig, ParameterRange};
use crate::types::{
    DeclineParams, DeclineVector, FitKind, FitResult, FixedQi, GoodnessOfFit, ModelError,
    Product, RateSeries, Segment, SeriesError, StrategyKind, MAX_B,
};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimationError {
    #[error("Insufficient data: {points} points, at least {required} required")]
    InsufficientData { points: usize, required: usize },

    #[error("{strategy} did not converge within {iterations} iterations (best cost {cost:.4e})")]
    NonConvergence {
        strategy: StrategyKind,
        iterations: usize,
        cost: f64,
    },

    #[error("Invalid {parameter} bounds: {reason}")]
    InvalidBounds {
        parameter: &'static str,
        reason: String,
    },

    #[error("Qi {qi:.3} is below the abandonment rate {limit:.3}")]
    BelowAbandonment { qi: f64, limit: f64 },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}

// ============================================================================
// Bounds and solutions
// ============================================================================

/// Box constraints on the free parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    pub dei: (f64, f64),
    pub b: (f64, f64),
}

impl ParameterBounds {
    pub fn new(dei: (f64, f64), b: (f64, f64)) -> Self {
        Self { dei, b }
    }

    /// Bounds from product ranges, rejecting inverted or out-of-domain limits
    pub fn from_ranges(
        dei: &ParameterRange,
        b: &ParameterRange,
    ) -> Result<Self, EstimationError> {
        let bounds = Self::new((dei.min, dei.max), (b.min, b.max));
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), EstimationError> {
        let (dlo, dhi) = self.dei;
        if !(dlo.is_finite() && dhi.is_finite()) {
            return Err(EstimationError::InvalidBounds {
                parameter: "Dei",
                reason: format!("[{dlo}, {dhi}] is not finite"),
            });
        }
        if dlo > dhi {
            return Err(EstimationError::InvalidBounds {
                parameter: "Dei",
                reason: format!("min {dlo} > max {dhi}"),
            });
        }
        if dlo < 0.0 || dhi >= 1.0 {
            return Err(EstimationError::InvalidBounds {
                parameter: "Dei",
                reason: format!("[{dlo}, {dhi}] must lie within [0, 1)"),
            });
        }
        let (blo, bhi) = self.b;
        if !(blo.is_finite() && bhi.is_finite()) {
            return Err(EstimationError::InvalidBounds {
                parameter: "b",
                reason: format!("[{blo}, {bhi}] is not finite"),
            });
        }
        if blo > bhi {
            return Err(EstimationError::InvalidBounds {
                parameter: "b",
                reason: format!("min {blo} > max {bhi}"),
            });
        }
        if blo < 0.0 || bhi > MAX_B {
            return Err(EstimationError::InvalidBounds {
                parameter: "b",
                reason: format!("[{blo}, {bhi}] must lie within [0, {MAX_B}]"),
            });
        }
        Ok(())
    }

    pub fn lower(&self) -> [f64; 2] {
        [self.dei.0, self.b.0]
    }

    pub fn upper(&self) -> [f64; 2] {
        [self.dei.1, self.b.1]
    }

    pub fn clamp(&self, v: DeclineVector) -> DeclineVector {
        DeclineVector::new(
            v.dei.clamp(self.dei.0, self.dei.1),
            v.b.clamp(self.b.0, self.b.1),
        )
    }

    /// Same Dei bounds with b collapsed onto one value
    pub fn with_pinned_b(&self, b: f64) -> Self {
        let b = b.clamp(self.b.0, self.b.1);
        Self::new(self.dei, (b, b))
    }
}

/// Optimizer output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub vector: DeclineVector,
    /// Half the sum of squared residuals
    pub cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
}

impl Solution {
    pub fn new(x: [f64; 2], cost: f64, iterations: usize, evaluations: usize) -> Self {
        Self {
            vector: DeclineVector::from_array(x),
            cost,
            iterations,
            evaluations,
        }
    }
}

// ============================================================================
// Strategy interface
// ============================================================================

/// One way of searching the (Dei, b) box
pub trait FitStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn estimate(
        &self,
        objective: &DeclineObjective,
        bounds: &ParameterBounds,
        guess: DeclineVector,
    ) -> Result<Solution, EstimationError>;
}

/// Build the strategy for `kind` from fitting settings
pub fn strategy_for(kind: StrategyKind, fitting: &FittingConfig) -> Box<dyn FitStrategy> {
    let local = LevenbergMarquardt::new(fitting.max_iterations);
    match kind {
        StrategyKind::LeastSquares => Box::new(local),
        StrategyKind::MonteCarlo => Box::new(MonteCarlo {
            trials: fitting.trials,
            seed: fitting.seed,
            local,
        }),
        StrategyKind::DifferentialEvolution => Box::new(DifferentialEvolution::new(
            DeOptions {
                population_size: fitting.population_size,
                max_generations: fitting.max_generations,
                seed: fitting.seed,
                ..DeOptions::default()
            },
            local,
        )),
    }
}

/// Strategies tried after `kind` fails to converge, in order
fn robust_fallbacks(kind: StrategyKind) -> &'static [StrategyKind] {
    match kind {
        StrategyKind::LeastSquares => &[StrategyKind::MonteCarlo, StrategyKind::DifferentialEvolution],
        StrategyKind::MonteCarlo => &[StrategyKind::DifferentialEvolution],
        StrategyKind::DifferentialEvolution => &[],
    }
}

// ============================================================================
// Estimator
// ============================================================================

/// Fits conditioned series for one configuration
pub struct ParameterEstimator<'a> {
    config: &'a DeclineConfig,
}

impl<'a> ParameterEstimator<'a> {
    pub fn new(config: &'a DeclineConfig) -> Self {
        Self { config }
    }

    /// Fit the output of the signal conditioner
    pub fn fit(
        &self,
        product: Product,
        conditioned: &ConditionedSeries,
    ) -> Result<FitResult, EstimationError> {
        self.fit_series(product, &conditioned.series, conditioned.qi, Some(conditioned.segment))
    }

    /// Fit an explicit series with an explicit Qi boundary condition
    pub fn fit_series(
        &self,
        product: Product,
        series: &RateSeries,
        qi: FixedQi,
        segment: Option<Segment>,
    ) -> Result<FitResult, EstimationError> {
        let fitting = &self.config.fitting;
        let product_config = self.config.product(product);

        if series.len() < fitting.min_points {
            return Err(EstimationError::InsufficientData {
                points: series.len(),
                required: fitting.min_points,
            });
        }
        if qi.value() < product_config.abandonment_rate {
            return Err(EstimationError::BelowAbandonment {
                qi: qi.value(),
                limit: product_config.abandonment_rate,
            });
        }

        let mut bounds =
            ParameterBounds::from_ranges(&product_config.dei_range(), &product_config.b_factor)?;
        let mut guess = DeclineVector::new(
            product_config.initial_decline.guess,
            product_config.b_factor.guess,
        );

        let b_config = &self.config.b_estimation;
        if b_config.enabled {
            ParameterBounds::new(bounds.dei, (b_config.min_b, b_config.max_b)).validate()?;
            if let Some(est) = b_factor::estimate(series, b_config.min_b, b_config.max_b) {
                bounds.b = (est.low, est.high);
                guess.b = est.guess;
                bounds.validate()?;
            }
        }

        let fit_kind = if series.len() < fitting.min_points_full_fit {
            bounds = bounds.with_pinned_b(guess.b);
            FitKind::DeiOnly
        } else {
            FitKind::Full
        };
        let guess = bounds.clamp(guess);

        let objective =
            DeclineObjective::new(series, qi, product_config.terminal_decline, fitting.periods_per_year);
        let (strategy, solution) = self.search(&objective, &bounds, guess)?;

        let params = DeclineParams::from_parts(qi, solution.vector, product_config.terminal_decline)?;
        let model = crate::decline::ArpsModel::new(params, fitting.periods_per_year)?;
        let predicted_rates = model.rates(&series.times());
        let predicted = series.with_rates(&predicted_rates)?;
        let goodness = GoodnessOfFit::compute(&series.rates(), &predicted_rates);

        debug!(
            product = %product,
            qi = %qi,
            dei = params.dei,
            b = params.b,
            r2 = goodness.r2,
            strategy = %strategy,
            fit_kind = ?fit_kind,
            "Decline fit complete"
        );

        Ok(FitResult {
            product,
            params,
            qi_candidate: qi,
            predicted,
            goodness,
            transition_time: model.transition_time(),
            strategy,
            fit_kind,
            segment,
            evaluations: solution.evaluations,
        })
    }

    /// Run the configured strategy, then the robust fallbacks if allowed
    fn search(
        &self,
        objective: &DeclineObjective,
        bounds: &ParameterBounds,
        guess: DeclineVector,
    ) -> Result<(StrategyKind, Solution), EstimationError> {
        let fitting = &self.config.fitting;
        let primary = fitting.strategy;

        let first_error = match strategy_for(primary, fitting).estimate(objective, bounds, guess) {
            Ok(solution) => return Ok((primary, solution)),
            Err(e @ EstimationError::NonConvergence { .. }) => e,
            Err(e) => return Err(e),
        };

        if !fitting.retry_with_robust_strategy {
            return Err(first_error);
        }

        warn!(strategy = %primary, error = %first_error, "Fit did not converge, retrying with robust strategy");
        let mut last_error = first_error;
        for &kind in robust_fallbacks(primary) {
            match strategy_for(kind, fitting).estimate(objective, bounds, guess) {
                Ok(solution) => {
                    info!(strategy = %kind, "Robust retry converged");
                    return Ok((kind, solution));
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}
