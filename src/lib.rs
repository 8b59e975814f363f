//! Arps decline-curve fitting and validation engine
//!
//! Fits modified-hyperbolic Arps declines to well production series with the
//! initial rate held fixed at the first conditioned observation, then checks
//! every fit against the invariants a trustworthy decline must satisfy.
//!
//! ## Architecture
//!
//! - **Signal Conditioner**: outlier rejection, regime selection, smoothing, t = 0 re-indexing
//! - **Decline Model**: rate, cumulative and decline of the modified hyperbola
//! - **Parameter Estimator**: (Dei, b) search with Qi as a fixed boundary condition
//! - **Forecast Generator**: historical reconstruction and forward forecasts
//! - **Fit Validator**: six post-fit checks, advisory or strict
//! - **Pipeline**: per-well stage sequence, parallel batches, aggregate type curves

pub mod conditioning;
pub mod config;
pub mod decline;
pub mod estimation;
pub mod forecast;
pub mod pipeline;
pub mod types;
pub mod validation;

// Re-export configuration
pub use config::{ConfigError, DeclineConfig};

// Re-export commonly used types
pub use types::{
    DeclineParams, DeclineVector, FitKind, FitResult, FixedQi, GoodnessOfFit, Product,
    RatePoint, RateSeries, Segment, SegmentRole, StrategyKind, ValidationReport,
};

// Re-export stage entry points
pub use conditioning::{ConditionedSeries, SignalConditioner};
pub use decline::ArpsModel;
pub use estimation::{EstimationError, FitStrategy, ParameterEstimator};
pub use forecast::{Forecast, ForecastGenerator};
pub use pipeline::{BatchReport, DeclinePipeline, PipelineError, WellOutcome, WellSeries, WellStatus};
pub use validation::{FitValidator, ValidationError};
