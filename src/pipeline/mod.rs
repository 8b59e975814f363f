//! Decline Pipeline Module
//!
//! ## Per-Well Stage Sequence
//!
//! ```text
//! STAGE 1: Signal Conditioning (outliers, regime selection, smoothing, t = 0, Qi)
//! STAGE 2: Parameter Estimation (Dei, b with Qi fixed)
//! STAGE 3: Fit Validation (six checks, strict or advisory)
//! STAGE 4: Forecast (ONLY if a horizon was requested)
//! ```
//!
//! Wells are processed independently and in parallel. A well that cannot be
//! fitted ends as `Skipped` or `Failed` in its own outcome; the batch always
//! completes.

mod coordinator;
mod state;
pub mod type_curve;

pub use coordinator::{DeclinePipeline, ForecastSettings, PipelineError};
pub use state::*;
pub use type_curve::{TypeCurve, TypeCurvePoint};
