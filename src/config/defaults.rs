//! Built-in default constants.
//!
//! Every serde default in `decline_config.rs` resolves to one of these, so a
//! missing config file behaves identically to an empty one.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Fitting
// ============================================================================

/// Production periods per year (monthly data).
pub const PERIODS_PER_YEAR: f64 = 12.0;

/// Levenberg–Marquardt iteration budget per run.
pub const LM_MAX_ITERATIONS: usize = 200;

/// Randomized restarts for the Monte Carlo strategy.
pub const MONTE_CARLO_TRIALS: usize = 50;

/// Differential evolution population size.
pub const DE_POPULATION_SIZE: usize = 30;

/// Differential evolution generation budget.
pub const DE_MAX_GENERATIONS: usize = 1_000;

/// Seed for every stochastic strategy.
pub const FIT_SEED: u64 = 42;

/// Below this many points a series is not fitted.
pub const MIN_FIT_POINTS: usize = 3;

/// Below this many points only Dei is fitted (b pinned at its guess).
pub const MIN_FULL_FIT_POINTS: usize = 7;

// ============================================================================
// Conditioning
// ============================================================================

/// Passes of the centred 3-point moving average.
pub const SMOOTHING_FACTOR: u32 = 2;

/// Regimes shorter than this are merged into a neighbour.
pub const MIN_SEGMENT_LENGTH: usize = 12;

/// Minimum neighbour distance (periods) for the outlier derivative score.
pub const OUTLIER_WINDOW: f64 = 1.0;

/// Z-score above which a sample is rejected.
pub const OUTLIER_Z_THRESHOLD: f64 = 3.0;

/// Outlier rejection is skipped below this many samples.
pub const OUTLIER_MIN_ARRAY_SIZE: usize = 6;

/// Change-point penalty in units of the log-rate step variance.
pub const CHANGEPOINT_PENALTY: f64 = 10.0;

/// Floor on the log-rate step variance.
///
/// 0.01 corresponds to ~10% period-to-period noise; clean synthetic curves
/// would otherwise have near-zero variance and split everywhere.
pub const CHANGEPOINT_NOISE_FLOOR: f64 = 0.01;

/// Minimum number of log-rate steps per regime.
pub const CHANGEPOINT_MIN_SEGMENT_SIZE: usize = 2;

// ============================================================================
// Validation
// ============================================================================

/// |t[0]| above this fails the time-zero check.
pub const TIME_ZERO_TOLERANCE: f64 = 0.01;

/// First-point error above which alignment fails (%).
pub const FIRST_POINT_WARNING_PCT: f64 = 15.0;

/// First-point error below which alignment is good (%).
pub const FIRST_POINT_GOOD_PCT: f64 = 10.0;

/// Allowed relative step increase of a declining prediction.
pub const MONOTONIC_TOLERANCE: f64 = 0.05;

/// R² below this fails the fit-quality check.
pub const R2_MINIMUM: f64 = 0.70;

/// R² below this (but above minimum) is reported as a warning.
pub const R2_DESIRED: f64 = 0.85;

/// |mean residual| above this multiple of the residual std indicates bias.
pub const RESIDUAL_BIAS_RATIO: f64 = 0.5;

/// Bias smaller than this fraction of the mean observed rate is ignored.
pub const RESIDUAL_BIAS_FLOOR: f64 = 0.01;

// ============================================================================
// b-factor estimation
// ============================================================================

pub const ESTIMATED_B_MIN: f64 = 0.5;
pub const ESTIMATED_B_MAX: f64 = 1.4;

// ============================================================================
// Products
// ============================================================================

/// Initial decline guess and upper bound (effective annual). The lower
/// bound defaults to the product's terminal decline.
pub const DEI_GUESS: f64 = 0.5;
pub const DEI_MAX: f64 = 0.95;

/// b-factor bounds.
pub const B_MIN: f64 = 0.0;
pub const B_MAX: f64 = 2.0;

pub const OIL_B_GUESS: f64 = 0.9;
pub const GAS_B_GUESS: f64 = 1.0;
pub const WATER_B_GUESS: f64 = 0.9;

/// Terminal effective annual decline.
pub const OIL_TERMINAL_DECLINE: f64 = 0.08;
pub const GAS_TERMINAL_DECLINE: f64 = 0.06;
pub const WATER_TERMINAL_DECLINE: f64 = 0.08;

/// Economic limit rates (per period).
pub const OIL_ABANDONMENT_RATE: f64 = 1.0;
pub const GAS_ABANDONMENT_RATE: f64 = 10.0;
pub const WATER_ABANDONMENT_RATE: f64 = 1.0;
