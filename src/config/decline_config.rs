//! Decline Configuration - every fitting knob as an operator-tunable TOML value
//!
//! Each struct implements `Default` with values matching the built-in
//! constants in `defaults`, so a missing config file behaves identically to
//! an empty one.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::{Product, SegmentRole, StrategyKind};

// ============================================================================
// Config Provenance: tracks which keys the user explicitly set
// ============================================================================

/// Tracks which configuration keys were explicitly present in the user's TOML file.
///
/// After deserialization every `#[serde(default)]` field has a value, so this
/// is the only record of what the operator actually wrote.
#[derive(Debug, Clone, Default)]
pub struct ConfigProvenance {
    /// Dotted key paths explicitly present in the user's TOML file
    pub explicit_keys: HashSet<String>,
}

impl ConfigProvenance {
    /// Example: `provenance.is_user_set("products.gas.terminal_decline")`
    pub fn is_user_set(&self, dotted_key: &str) -> bool {
        self.explicit_keys.contains(dotted_key)
    }
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for decline fitting.
///
/// Passed by reference into every pipeline stage; there is no global copy.
/// Load with `DeclineConfig::load()` which searches:
/// 1. `$DECLINE_CONFIG` env var
/// 2. `./decline_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeclineConfig {
    /// Optimizer selection and budgets
    #[serde(default)]
    pub fitting: FittingConfig,

    /// Outlier rejection, change points, smoothing
    #[serde(default)]
    pub conditioning: ConditioningConfig,

    /// Fit validator thresholds
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Loss-ratio b-factor estimation
    #[serde(default)]
    pub b_estimation: BEstimationConfig,

    /// Per-product decline parameters
    #[serde(default)]
    pub products: ProductTable,
}

impl DeclineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$DECLINE_CONFIG` environment variable
    /// 2. `./decline_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        Self::load_with_provenance().0
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let (config, _provenance) = Self::load_from_file_with_provenance(path)?;
        Ok(config)
    }

    /// Load from a specific TOML file path, also returning provenance
    /// so callers can distinguish user-set values from defaults.
    pub fn load_from_file_with_provenance(
        path: &Path,
    ) -> Result<(Self, ConfigProvenance), ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents)
            .map_err(|e| match e {
                ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
                other => other,
            })
    }

    /// Parse and validate a TOML document.
    ///
    /// Two-pass: unknown keys are reported as warnings first, then the
    /// document is deserialized and validated.
    pub fn from_toml_str(contents: &str) -> Result<(Self, ConfigProvenance), ConfigError> {
        let typo_warnings = super::validation::validate_unknown_keys(contents);
        for w in &typo_warnings {
            warn!("{}", w);
        }

        let provenance = ConfigProvenance {
            explicit_keys: super::validation::walk_toml_keys(
                &contents
                    .parse::<toml::Value>()
                    .unwrap_or(toml::Value::Table(Default::default())),
                "",
            )
            .into_iter()
            .collect(),
        };

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::from("<string>"), e))?;
        config.validate()?;
        Ok((config, provenance))
    }

    /// Load configuration using standard search order, returning provenance.
    pub fn load_with_provenance() -> (Self, ConfigProvenance) {
        // 1. Check env var
        if let Ok(path) = std::env::var("DECLINE_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file_with_provenance(&p) {
                    Ok((config, provenance)) => {
                        info!(path = %p.display(), strategy = %config.fitting.strategy, "Loaded decline config from DECLINE_CONFIG");
                        return (config, provenance);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from DECLINE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "DECLINE_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./decline_config.toml
        let local = PathBuf::from("decline_config.toml");
        if local.exists() {
            match Self::load_from_file_with_provenance(&local) {
                Ok((config, provenance)) => {
                    info!(strategy = %config.fitting.strategy, "Loaded decline config from ./decline_config.toml");
                    return (config, provenance);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./decline_config.toml, using defaults");
                }
            }
        }

        // 3. Defaults, no file, so nothing is user-set
        info!("No decline_config.toml found, using built-in defaults");
        (Self::default(), ConfigProvenance::default())
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Decline config saved");
        Ok(())
    }

    /// Per-product decline parameters
    pub fn product(&self, product: Product) -> &ProductConfig {
        self.products.get(product)
    }

    /// Validate all settings for internal consistency.
    ///
    /// Rules:
    /// - every bound triple satisfies min <= guess <= max
    /// - Dei stays below 1 (the nominal conversion diverges at 1)
    /// - validator thresholds escalate in the right direction
    /// - iteration budgets and minimum sizes are > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Fitting
        let f = &self.fitting;
        if !f.periods_per_year.is_finite() || f.periods_per_year <= 0.0 {
            errors.push(format!(
                "fitting.periods_per_year = {} must be a finite number > 0",
                f.periods_per_year
            ));
        }
        if f.max_iterations == 0 {
            errors.push("fitting.max_iterations must be > 0".to_string());
        }
        if f.trials == 0 {
            errors.push("fitting.trials must be > 0".to_string());
        }
        if f.population_size < 4 {
            errors.push(format!(
                "fitting.population_size = {} must be >= 4 (differential evolution needs 3 donors)",
                f.population_size
            ));
        }
        if f.max_generations == 0 {
            errors.push("fitting.max_generations must be > 0".to_string());
        }
        if f.min_points < 2 {
            errors.push(format!("fitting.min_points = {} must be >= 2", f.min_points));
        }
        if f.min_points_full_fit < f.min_points {
            errors.push(format!(
                "fitting.min_points_full_fit ({}) must be >= min_points ({})",
                f.min_points_full_fit, f.min_points
            ));
        }

        // Conditioning
        let c = &self.conditioning;
        if c.outliers.window <= 0.0 || !c.outliers.window.is_finite() {
            errors.push("conditioning.outliers.window must be a finite number > 0".to_string());
        }
        if c.outliers.z_threshold <= 0.0 {
            errors.push("conditioning.outliers.z_threshold must be > 0".to_string());
        }
        if c.outliers.min_array_size < 3 {
            errors.push("conditioning.outliers.min_array_size must be >= 3".to_string());
        }
        if c.changepoint.penalty <= 0.0 {
            errors.push("conditioning.changepoint.penalty must be > 0".to_string());
        }
        if c.changepoint.noise_floor <= 0.0 {
            errors.push("conditioning.changepoint.noise_floor must be > 0".to_string());
        }
        if c.changepoint.min_segment_size == 0 {
            errors.push("conditioning.changepoint.min_segment_size must be > 0".to_string());
        }

        // Validator: good threshold is tighter than warning threshold
        let v = &self.validation;
        if v.first_point_good_pct > v.first_point_warning_pct {
            errors.push(format!(
                "validation.first_point_good_pct ({:.1}) must be <= first_point_warning_pct ({:.1})",
                v.first_point_good_pct, v.first_point_warning_pct
            ));
        }
        if v.r2_desired < v.r2_minimum {
            errors.push(format!(
                "validation.r2_desired ({:.2}) must be >= r2_minimum ({:.2})",
                v.r2_desired, v.r2_minimum
            ));
        }
        if v.monotonic_tolerance < 0.0 {
            errors.push("validation.monotonic_tolerance cannot be negative".to_string());
        }
        if v.residual_bias_ratio <= 0.0 {
            errors.push("validation.residual_bias_ratio must be > 0".to_string());
        }

        // b estimation
        let be = &self.b_estimation;
        if be.min_b > be.max_b {
            errors.push(format!(
                "b_estimation.min_b ({:.3}) must be <= max_b ({:.3})",
                be.min_b, be.max_b
            ));
        }

        // Products
        for product in Product::ALL {
            self.product(product).check(product, &mut errors);
        }

        // Physical range validation
        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        // Reject NaN/Inf in any config value (sweep all f64 fields via serialization)
        if let Ok(ref s) = toml::to_string(self) {
            if s.contains("nan") || s.contains("inf") {
                errors.push(
                    "Config contains NaN or Inf values; all settings must be finite numbers"
                        .to_string(),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Fitting
// ============================================================================

/// Optimizer selection and iteration budgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittingConfig {
    /// Search strategy used for every fit
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Randomized restarts for the Monte Carlo strategy
    #[serde(default = "default_trials")]
    pub trials: usize,

    /// Levenberg–Marquardt iteration budget per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Differential evolution population size
    #[serde(default = "default_population_size")]
    pub population_size: usize,

    /// Differential evolution generation budget
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,

    /// RNG seed for the stochastic strategies (fits are reproducible)
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Below this many points a series is not fitted at all
    #[serde(default = "default_min_points")]
    pub min_points: usize,

    /// Below this many points b is pinned at its guess and only Dei is fitted
    #[serde(default = "default_min_points_full_fit")]
    pub min_points_full_fit: usize,

    /// Production periods per year (12 for monthly data)
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: f64,

    /// On non-convergence, retry with Monte Carlo then differential evolution
    #[serde(default = "default_true")]
    pub retry_with_robust_strategy: bool,
}

fn default_trials() -> usize { defaults::MONTE_CARLO_TRIALS }
fn default_max_iterations() -> usize { defaults::LM_MAX_ITERATIONS }
fn default_population_size() -> usize { defaults::DE_POPULATION_SIZE }
fn default_max_generations() -> usize { defaults::DE_MAX_GENERATIONS }
fn default_seed() -> u64 { defaults::FIT_SEED }
fn default_min_points() -> usize { defaults::MIN_FIT_POINTS }
fn default_min_points_full_fit() -> usize { defaults::MIN_FULL_FIT_POINTS }
fn default_periods_per_year() -> f64 { defaults::PERIODS_PER_YEAR }
fn default_true() -> bool { true }
fn default_false() -> bool { false }

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            trials: default_trials(),
            max_iterations: default_max_iterations(),
            population_size: default_population_size(),
            max_generations: default_max_generations(),
            seed: default_seed(),
            min_points: default_min_points(),
            min_points_full_fit: default_min_points_full_fit(),
            periods_per_year: default_periods_per_year(),
            retry_with_robust_strategy: true,
        }
    }
}

// ============================================================================
// Conditioning
// ============================================================================

/// Signal conditioning settings.
///
/// Also used as the provenance stamp on conditioned series, so two series
/// conditioned with equal settings compare equal here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditioningConfig {
    #[serde(default)]
    pub outliers: OutlierConfig,

    #[serde(default)]
    pub changepoint: ChangepointConfig,

    /// Passes of the centred 3-point moving average (0 = off)
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: u32,

    /// Which regime to fit after segmentation
    #[serde(default = "default_segment_role")]
    pub segment_role: SegmentRole,

    /// Segments shorter than this are merged with their neighbours
    #[serde(default = "default_min_segment_length")]
    pub min_segment_length: usize,
}

fn default_smoothing_factor() -> u32 { defaults::SMOOTHING_FACTOR }
fn default_segment_role() -> SegmentRole { SegmentRole::Last }
fn default_min_segment_length() -> usize { defaults::MIN_SEGMENT_LENGTH }

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            outliers: OutlierConfig::default(),
            changepoint: ChangepointConfig::default(),
            smoothing_factor: default_smoothing_factor(),
            segment_role: default_segment_role(),
            min_segment_length: default_min_segment_length(),
        }
    }
}

impl ConditioningConfig {
    /// Settings that leave a series untouched apart from re-indexing
    pub fn passthrough() -> Self {
        Self {
            outliers: OutlierConfig {
                enabled: false,
                ..OutlierConfig::default()
            },
            changepoint: ChangepointConfig {
                enabled: false,
                ..ChangepointConfig::default()
            },
            smoothing_factor: 0,
            segment_role: SegmentRole::All,
            min_segment_length: default_min_segment_length(),
        }
    }
}

/// Derivative-based outlier rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum time distance (periods) to the neighbours used for the local derivative
    #[serde(default = "default_outlier_window")]
    pub window: f64,

    /// Z-score above which a sample is rejected
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,

    /// Below this many samples rejection is skipped entirely
    #[serde(default = "default_min_array_size")]
    pub min_array_size: usize,
}

fn default_outlier_window() -> f64 { defaults::OUTLIER_WINDOW }
fn default_z_threshold() -> f64 { defaults::OUTLIER_Z_THRESHOLD }
fn default_min_array_size() -> usize { defaults::OUTLIER_MIN_ARRAY_SIZE }

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: default_outlier_window(),
            z_threshold: default_z_threshold(),
            min_array_size: default_min_array_size(),
        }
    }
}

/// Change-point segmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangepointConfig {
    #[serde(default = "default_false")]
    pub enabled: bool,

    /// Penalty per additional segment, in units of the noise variance
    #[serde(default = "default_cp_penalty")]
    pub penalty: f64,

    /// Floor on the estimated log-rate step variance
    #[serde(default = "default_cp_noise_floor")]
    pub noise_floor: f64,

    /// Minimum number of steps between change points
    #[serde(default = "default_cp_min_segment_size")]
    pub min_segment_size: usize,
}

fn default_cp_penalty() -> f64 { defaults::CHANGEPOINT_PENALTY }
fn default_cp_noise_floor() -> f64 { defaults::CHANGEPOINT_NOISE_FLOOR }
fn default_cp_min_segment_size() -> usize { defaults::CHANGEPOINT_MIN_SEGMENT_SIZE }

impl Default for ChangepointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            penalty: default_cp_penalty(),
            noise_floor: default_cp_noise_floor(),
            min_segment_size: default_cp_min_segment_size(),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Fit validator thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Failures raise an error instead of a warning
    #[serde(default = "default_false")]
    pub strict: bool,

    /// |t[0]| above this fails the time-zero check
    #[serde(default = "default_time_zero_tolerance")]
    pub time_zero_tolerance: f64,

    /// First-point error (%) above which the alignment check fails
    #[serde(default = "default_first_point_warning")]
    pub first_point_warning_pct: f64,

    /// First-point error (%) below which alignment is considered good
    #[serde(default = "default_first_point_good")]
    pub first_point_good_pct: f64,

    /// Allowed step-to-step increase of predicted rates (fraction)
    #[serde(default = "default_monotonic_tolerance")]
    pub monotonic_tolerance: f64,

    #[serde(default = "default_r2_minimum")]
    pub r2_minimum: f64,

    #[serde(default = "default_r2_desired")]
    pub r2_desired: f64,

    /// |mean residual| / std residual above this indicates bias
    #[serde(default = "default_residual_bias_ratio")]
    pub residual_bias_ratio: f64,

    /// |mean residual| / mean rate below this is never reported as bias
    #[serde(default = "default_residual_bias_floor")]
    pub residual_bias_floor: f64,
}

fn default_time_zero_tolerance() -> f64 { defaults::TIME_ZERO_TOLERANCE }
fn default_first_point_warning() -> f64 { defaults::FIRST_POINT_WARNING_PCT }
fn default_first_point_good() -> f64 { defaults::FIRST_POINT_GOOD_PCT }
fn default_monotonic_tolerance() -> f64 { defaults::MONOTONIC_TOLERANCE }
fn default_r2_minimum() -> f64 { defaults::R2_MINIMUM }
fn default_r2_desired() -> f64 { defaults::R2_DESIRED }
fn default_residual_bias_ratio() -> f64 { defaults::RESIDUAL_BIAS_RATIO }
fn default_residual_bias_floor() -> f64 { defaults::RESIDUAL_BIAS_FLOOR }

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict: false,
            time_zero_tolerance: default_time_zero_tolerance(),
            first_point_warning_pct: default_first_point_warning(),
            first_point_good_pct: default_first_point_good(),
            monotonic_tolerance: default_monotonic_tolerance(),
            r2_minimum: default_r2_minimum(),
            r2_desired: default_r2_desired(),
            residual_bias_ratio: default_residual_bias_ratio(),
            residual_bias_floor: default_residual_bias_floor(),
        }
    }
}

// ============================================================================
// b-factor estimation
// ============================================================================

/// Loss-ratio b-factor estimation; when enabled it replaces the product's b bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BEstimationConfig {
    #[serde(default = "default_false")]
    pub enabled: bool,

    #[serde(default = "default_min_b")]
    pub min_b: f64,

    #[serde(default = "default_max_b")]
    pub max_b: f64,
}

fn default_min_b() -> f64 { defaults::ESTIMATED_B_MIN }
fn default_max_b() -> f64 { defaults::ESTIMATED_B_MAX }

impl Default for BEstimationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_b: default_min_b(),
            max_b: default_max_b(),
        }
    }
}

// ============================================================================
// Products
// ============================================================================

/// What the decline-trend check expects of predicted rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MonotonicityPolicy {
    /// Rates must be non-increasing
    #[default]
    Decline,
    /// Rates must be non-decreasing
    Incline,
    /// Trend is not checked
    Skip,
}

/// `min <= guess <= max` triple for one fitted parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub guess: f64,
    pub max: f64,
}

impl ParameterRange {
    pub fn new(min: f64, guess: f64, max: f64) -> Self {
        Self { min, guess, max }
    }

    pub fn is_ordered(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.guess.is_finite()
            && self.min <= self.guess
            && self.guess <= self.max
    }
}

/// Dei bounds and guess. Without an explicit `min` the lower bound is the
/// product's terminal decline, so a fitted curve never starts shallower
/// than its own tail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialDeclineRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    pub guess: f64,
    pub max: f64,
}

impl InitialDeclineRange {
    pub fn new(min: Option<f64>, guess: f64, max: f64) -> Self {
        Self { min, guess, max }
    }

    /// Concrete range for a product with terminal decline `def`
    pub fn resolve(&self, def: f64) -> ParameterRange {
        ParameterRange::new(self.min.unwrap_or(def), self.guess, self.max)
    }
}

/// Decline settings for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductConfig {
    /// Def: terminal effective annual decline, fixed during fitting
    pub terminal_decline: f64,

    /// Dei bounds and initial guess (effective annual)
    pub initial_decline: InitialDeclineRange,

    /// b-factor bounds and initial guess
    pub b_factor: ParameterRange,

    /// Rate below which a well is not worth fitting or forecasting
    pub abandonment_rate: f64,

    #[serde(default)]
    pub monotonicity: MonotonicityPolicy,
}

impl ProductConfig {
    pub fn defaults_for(product: Product) -> Self {
        let (terminal_decline, b_guess, abandonment_rate) = match product {
            Product::Oil => (defaults::OIL_TERMINAL_DECLINE, defaults::OIL_B_GUESS, defaults::OIL_ABANDONMENT_RATE),
            Product::Gas => (defaults::GAS_TERMINAL_DECLINE, defaults::GAS_B_GUESS, defaults::GAS_ABANDONMENT_RATE),
            Product::Water => (defaults::WATER_TERMINAL_DECLINE, defaults::WATER_B_GUESS, defaults::WATER_ABANDONMENT_RATE),
        };
        Self {
            terminal_decline,
            initial_decline: InitialDeclineRange::new(None, defaults::DEI_GUESS, defaults::DEI_MAX),
            b_factor: ParameterRange::new(defaults::B_MIN, b_guess, defaults::B_MAX),
            abandonment_rate,
            monotonicity: MonotonicityPolicy::Decline,
        }
    }

    /// Dei search range with the lower bound resolved
    pub fn dei_range(&self) -> ParameterRange {
        self.initial_decline.resolve(self.terminal_decline)
    }

    fn check(&self, product: Product, errors: &mut Vec<String>) {
        let name = format!("products.{product}");
        if !(0.0..1.0).contains(&self.terminal_decline) {
            errors.push(format!(
                "{name}.terminal_decline = {:.4} must be in [0, 1)",
                self.terminal_decline
            ));
        }
        let dei = self.dei_range();
        let ordered = match self.initial_decline.min {
            Some(_) => dei.is_ordered(),
            // A guess below the terminal decline is clamped up by the estimator
            None => dei.guess.is_finite() && dei.guess <= dei.max && dei.min <= dei.max,
        };
        if !ordered {
            errors.push(format!(
                "{name}.initial_decline: expected min <= guess <= max (got {:.4} / {:.4} / {:.4})",
                dei.min, dei.guess, dei.max
            ));
        }
        if dei.min < 0.0 || dei.max >= 1.0 {
            errors.push(format!(
                "{name}.initial_decline bounds must lie in [0, 1) (got {:.4}..{:.4})",
                dei.min, dei.max
            ));
        }
        if !self.b_factor.is_ordered() {
            errors.push(format!(
                "{name}.b_factor: expected min <= guess <= max (got {:.4} / {:.4} / {:.4})",
                self.b_factor.min, self.b_factor.guess, self.b_factor.max
            ));
        }
        if self.b_factor.min < 0.0 || self.b_factor.max > crate::types::MAX_B {
            errors.push(format!(
                "{name}.b_factor bounds must lie in [0, 2] (got {:.4}..{:.4})",
                self.b_factor.min, self.b_factor.max
            ));
        }
        if self.abandonment_rate < 0.0 {
            errors.push(format!(
                "{name}.abandonment_rate = {:.4} cannot be negative",
                self.abandonment_rate
            ));
        }
    }
}

/// Product-keyed decline settings (`[products.oil]`, `[products.gas]`, `[products.water]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTable {
    #[serde(default = "default_oil")]
    pub oil: ProductConfig,
    #[serde(default = "default_gas")]
    pub gas: ProductConfig,
    #[serde(default = "default_water")]
    pub water: ProductConfig,
}

fn default_oil() -> ProductConfig { ProductConfig::defaults_for(Product::Oil) }
fn default_gas() -> ProductConfig { ProductConfig::defaults_for(Product::Gas) }
fn default_water() -> ProductConfig { ProductConfig::defaults_for(Product::Water) }

impl Default for ProductTable {
    fn default() -> Self {
        Self {
            oil: default_oil(),
            gas: default_gas(),
            water: default_water(),
        }
    }
}

impl ProductTable {
    pub fn get(&self, product: Product) -> &ProductConfig {
        match product {
            Product::Oil => &self.oil,
            Product::Gas => &self.gas,
            Product::Water => &self.water,
        }
    }

    pub fn get_mut(&mut self, product: Product) -> &mut ProductConfig {
        match product {
            Product::Oil => &mut self.oil,
            Product::Gas => &mut self.gas,
            Product::Water => &mut self.water,
        }
    }
}
