//! Config Validation Tests
//!
//! Typo detection, range validation and file loading for `DeclineConfig`,
//! exercised independently from the fitting pipeline.

use arps_decline::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use arps_decline::config::{ConfigError, DeclineConfig, MonotonicityPolicy};
use arps_decline::{DeclinePipeline, Product, RateSeries, StrategyKind, WellSeries, WellStatus};

const FULL_CONFIG: &str = r#"
[fitting]
strategy = "monte_carlo"
trials = 20
seed = 7
periods_per_year = 12.0

[conditioning]
smoothing_factor = 1
segment_role = "last"

[conditioning.outliers]
enabled = true
z_threshold = 3.5

[validation]
strict = true
r2_minimum = 0.75

[b_estimation]
enabled = true

[products.water]
terminal_decline = 0.05
abandonment_rate = 2.0
monotonicity = "skip"

[products.water.initial_decline]
min = 0.0
guess = 0.3
max = 0.9

[products.water.b_factor]
min = 0.0
guess = 0.8
max = 1.5
"#;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_fitting_section_warns_with_suggestion() {
    let toml_str = r#"
[fitting]
stratgy = "least_squares"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(warnings[0].field, "fitting.stratgy");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("fitting.strategy"));
}

#[test]
fn typo_in_product_section_warns() {
    let toml_str = r#"
[products.gas]
terminal_decine = 0.06
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("products.gas.terminal_decline")
    );
}

#[test]
fn valid_config_produces_zero_warnings() {
    assert!(validate_unknown_keys(FULL_CONFIG).is_empty());
}

#[test]
fn unrelated_key_has_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("telemetry.endpoint", &known).is_none());
}

#[test]
fn every_product_has_its_own_keys() {
    let known = known_config_keys();
    for product in Product::ALL {
        assert!(known.contains(&format!("products.{product}.b_factor.guess")));
    }
}

// ============================================================================
// Parsing & Range Validation
// ============================================================================

#[test]
fn full_config_parses_with_overrides() {
    let (config, provenance) = DeclineConfig::from_toml_str(FULL_CONFIG).unwrap();
    assert_eq!(config.fitting.strategy, StrategyKind::MonteCarlo);
    assert_eq!(config.fitting.trials, 20);
    assert!(config.validation.strict);
    assert_eq!(config.product(Product::Water).monotonicity, MonotonicityPolicy::Skip);
    // Untouched sections keep defaults
    assert_eq!(config.product(Product::Oil), DeclineConfig::default().product(Product::Oil));
    assert!(provenance.is_user_set("validation.r2_minimum"));
    assert!(!provenance.is_user_set("validation.r2_desired"));
}

#[test]
fn inverted_bounds_are_collected_together() {
    let toml_str = r#"
[validation]
r2_minimum = 0.9
r2_desired = 0.8

[products.oil]
terminal_decline = 0.08
abandonment_rate = 1.0

[products.oil.initial_decline]
min = 0.6
guess = 0.5
max = 0.95

[products.oil.b_factor]
min = 0.0
guess = 0.9
max = 2.0
"#;
    match DeclineConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 2, "{errors:?}");
            assert!(errors.iter().any(|e| e.contains("r2_desired")));
            assert!(errors.iter().any(|e| e.contains("products.oil.initial_decline")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn dei_at_one_is_rejected() {
    let mut config = DeclineConfig::default();
    config.products.get_mut(Product::Gas).initial_decline.max = 1.0;
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn incomplete_product_section_fails_to_parse() {
    let toml_str = r#"
[products.oil]
terminal_decline = 0.08
"#;
    assert!(matches!(
        DeclineConfig::from_toml_str(toml_str),
        Err(ConfigError::Parse(..))
    ));
}

#[test]
fn nan_values_are_rejected() {
    let mut config = DeclineConfig::default();
    config.validation.monotonic_tolerance = f64::NAN;
    assert!(config.validate().is_err());
}

#[test]
fn inverted_b_estimation_range_fails_wells_without_panicking() {
    let mut config = DeclineConfig::default();
    config.b_estimation.enabled = true;
    config.b_estimation.min_b = 1.5;
    config.b_estimation.max_b = 0.5;
    assert!(config.validate().is_err());

    // A config built in code skips validate(); the batch must still finish
    let rates = [800.0, 720.0, 655.0, 600.0, 555.0, 517.0, 484.0, 455.0, 430.0];
    let wells: Vec<WellSeries> = (0..3)
        .map(|i| {
            WellSeries::new(format!("W-{i}"), Product::Oil, RateSeries::from_rates(&rates).unwrap())
        })
        .collect();
    let report = DeclinePipeline::new(&config).run_batch(&wells);

    assert_eq!(report.summary.failed, 3);
    for outcome in &report.outcomes {
        assert_eq!(outcome.status, WellStatus::Failed);
        assert!(outcome.fit.is_none());
        assert!(
            outcome.diagnostics.iter().any(|d| d.contains("Invalid b bounds")),
            "{:?}",
            outcome.diagnostics
        );
    }
}

#[test]
fn unusual_periods_per_year_warns_but_loads() {
    let mut config = DeclineConfig::default();
    config.fitting.periods_per_year = 10.0;
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "fitting.periods_per_year"));
    assert!(config.validate().is_ok());
}

// ============================================================================
// File Loading
// ============================================================================

#[test]
fn save_and_reload_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("decline_config.toml");

    let mut config = DeclineConfig::default();
    config.fitting.strategy = StrategyKind::DifferentialEvolution;
    config.conditioning.smoothing_factor = 0;
    config.save_to_file(&path).unwrap();

    let reloaded = DeclineConfig::load_from_file(&path).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    match DeclineConfig::load_from_file(&path) {
        Err(ConfigError::Io(p, _)) => assert_eq!(p, path),
        other => panic!("expected I/O error, got {other:?}"),
    }
}

#[test]
fn env_var_selects_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();

    std::env::set_var("DECLINE_CONFIG", &path);
    let (config, provenance) = DeclineConfig::load_with_provenance();
    std::env::remove_var("DECLINE_CONFIG");

    assert_eq!(config.fitting.seed, 7);
    assert!(provenance.is_user_set("fitting.seed"));
}
