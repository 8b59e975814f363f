//! Shared data structures for decline-curve analysis
//!
//! - `RateSeries` / `RatePoint`: time-ordered production rates
//! - `Segment` / `SegmentRole`: change-point regimes of a series
//! - `FixedQi`: the measured initial-rate boundary condition
//! - `DeclineParams` / `DeclineVector`: full parameter set vs free parameters
//! - `FitResult` / `GoodnessOfFit` / `ValidationReport`: fit outputs

mod fit;
mod params;
mod series;

pub use fit::*;
pub use params::*;
pub use series::*;
