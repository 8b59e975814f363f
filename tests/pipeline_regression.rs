//! Pipeline Regression Tests
//!
//! End-to-end scenarios through conditioning, estimation and validation,
//! plus the invariants every fit must keep: Qi taken from the conditioned
//! data and never fitted, predictions reproducible from the parameters, and
//! one well's failure never leaking into another's outcome.

use arps_decline::config::{ConditioningConfig, DeclineConfig};
use arps_decline::validation::{FIRST_POINT_ALIGNMENT, TIME_STARTS_AT_ZERO};
use arps_decline::{
    ArpsModel, DeclineParams, DeclinePipeline, FitKind, FixedQi, FitValidator, ForecastGenerator,
    ParameterEstimator, Product, RateSeries, SignalConditioner, StrategyKind, ValidationError,
    WellSeries, WellStatus,
};

const SCENARIO_A: [f64; 5] = [600.0, 591.37, 582.97, 574.80, 566.84];

/// Scenario A continued to twelve periods, same curve and rounding
const SCENARIO_A_LONG: [f64; 12] = [
    600.0, 591.37, 582.97, 574.80, 566.84, 559.09, 551.53, 544.17, 536.99, 529.99, 523.17, 516.50,
];

/// Exact modified-hyperbolic rates at t = 0..n
fn hyperbolic(qi: f64, dei: f64, def: f64, b: f64, n: u32) -> Vec<f64> {
    let model = ArpsModel::new(DeclineParams::new(qi, dei, def, b).unwrap(), 12.0).unwrap();
    let times: Vec<f64> = (0..n).map(f64::from).collect();
    model.rates(&times)
}

fn well(id: &str, product: Product, rates: &[f64]) -> WellSeries {
    WellSeries::new(id, product, RateSeries::from_rates(rates).unwrap())
}

fn passthrough_config() -> DeclineConfig {
    DeclineConfig {
        conditioning: ConditioningConfig::passthrough(),
        ..DeclineConfig::default()
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_a_recovers_known_parameters() {
    let config = passthrough_config();
    let outcome = DeclinePipeline::new(&config).process_well(&well("A", Product::Oil, &SCENARIO_A));

    assert_eq!(outcome.status, WellStatus::Fitted, "{:?}", outcome.diagnostics);
    let fit = outcome.fit.unwrap();
    assert_eq!(fit.params.qi, 600.0);
    assert!((fit.params.dei - 0.15).abs() < 0.005, "Dei = {}", fit.params.dei);
    assert!((fit.params.b - 0.9).abs() < 0.05, "b = {}", fit.params.b);
    assert!(fit.goodness.r2 > 0.999, "R² = {}", fit.goodness.r2);
    // Five points is below the full-fit threshold
    assert_eq!(fit.fit_kind, FitKind::DeiOnly);
    assert!(outcome.validation.unwrap().overall_pass);
}

#[test]
fn scenario_a_long_series_fits_both_parameters_with_every_strategy() {
    for strategy in [
        StrategyKind::LeastSquares,
        StrategyKind::MonteCarlo,
        StrategyKind::DifferentialEvolution,
    ] {
        let mut config = passthrough_config();
        config.fitting.strategy = strategy;
        config.fitting.trials = 10;
        config.fitting.retry_with_robust_strategy = false;

        let outcome =
            DeclinePipeline::new(&config).process_well(&well("A12", Product::Oil, &SCENARIO_A_LONG));

        assert_eq!(outcome.status, WellStatus::Fitted, "{strategy}: {:?}", outcome.diagnostics);
        let conditioned_qi = outcome.conditioning.unwrap().qi;
        let fit = outcome.fit.unwrap();
        assert_eq!(fit.strategy, strategy);
        assert_eq!(fit.fit_kind, FitKind::Full, "{strategy}");
        assert_eq!(fit.params.qi, 600.0, "{strategy}");
        assert_eq!(fit.qi_candidate, conditioned_qi, "{strategy}");
        assert!((fit.params.dei - 0.15).abs() < 0.005, "{strategy}: Dei = {}", fit.params.dei);
        assert!((fit.params.b - 0.9).abs() < 0.05, "{strategy}: b = {}", fit.params.b);
        assert!(fit.goodness.r2 > 0.999, "{strategy}: R² = {}", fit.goodness.r2);
        assert!(outcome.validation.unwrap().overall_pass, "{strategy}");
    }
}

#[test]
fn scenario_b_qi_follows_cleaned_first_point() {
    let mut config = DeclineConfig::default();
    config.conditioning.smoothing_factor = 0;
    let mut rates = vec![50.0];
    rates.extend(
        (0..24).map(|t| 19.5 * (1.0 + 0.9 * 0.05 * f64::from(t)).powf(-1.0 / 0.9)),
    );

    let outcome = DeclinePipeline::new(&config).process_well(&well("B", Product::Oil, &rates));

    assert_eq!(outcome.status, WellStatus::Fitted, "{:?}", outcome.diagnostics);
    let conditioning = outcome.conditioning.unwrap();
    assert_eq!(conditioning.removed_outliers, vec![0]);
    assert_eq!(conditioning.series.first().t, 0);
    assert_eq!(outcome.fit.unwrap().params.qi, 19.5);
    let report = outcome.validation.unwrap();
    assert_eq!(report.first_point_error_pct, Some(0.0));
    assert_eq!(report.passed(FIRST_POINT_ALIGNMENT), Some(true));
}

#[test]
fn scenario_c_flat_series_fits_without_decline() {
    let mut config = DeclineConfig::default();
    // An explicit zero floor lets Dei drop below Def
    config.products.oil.initial_decline.min = Some(0.0);
    let outcome = DeclinePipeline::new(&config).process_well(&well("C", Product::Oil, &[100.0; 24]));

    assert_eq!(outcome.status, WellStatus::Fitted, "{:?}", outcome.diagnostics);
    let fit = outcome.fit.unwrap();
    assert_eq!(fit.params.qi, 100.0);
    assert!(fit.params.dei < 0.01, "Dei = {}", fit.params.dei);
    assert!(fit.goodness.r2.is_finite());
}

#[test]
fn scenario_c_flat_series_passes_strict_with_default_floor() {
    let mut config = DeclineConfig::default();
    config.validation.strict = true;
    let outcome = DeclinePipeline::new(&config).process_well(&well("C", Product::Oil, &[100.0; 24]));

    assert_eq!(outcome.status, WellStatus::Fitted, "{:?}", outcome.diagnostics);
    let fit = outcome.fit.unwrap();
    assert_eq!(fit.params.qi, 100.0);
    assert!(fit.params.dei >= fit.params.def, "Dei = {}, Def = {}", fit.params.dei, fit.params.def);
    assert!(fit.params.dei < 0.15, "Dei = {}", fit.params.dei);
    let report = outcome.validation.unwrap();
    assert!(report.overall_pass, "{report:?}");
    assert!(report.errors.is_empty());
}

#[test]
fn scenario_d_cleaning_off_fits_raw_series() {
    let mut config = DeclineConfig::default();
    config.conditioning.outliers.enabled = false;
    config.conditioning.smoothing_factor = 0;
    let mut rates = hyperbolic(400.0, 0.5, 0.08, 0.8, 18);
    rates[9] *= 2.0;

    let outcome = DeclinePipeline::new(&config).process_well(&well("D", Product::Oil, &rates));

    assert_eq!(outcome.status, WellStatus::Fitted, "{:?}", outcome.diagnostics);
    let conditioning = outcome.conditioning.unwrap();
    assert!(conditioning.removed_outliers.is_empty());
    assert_eq!(conditioning.series.rates(), rates);
    let fit = outcome.fit.unwrap();
    assert_eq!(fit.params.qi, 400.0);
    assert_eq!(fit.predicted.len(), rates.len());
}

#[test]
fn scenario_e_strict_mode_rejects_misindexed_series() {
    let mut config = DeclineConfig::default();
    config.validation.strict = true;
    let rates = hyperbolic(500.0, 0.5, 0.08, 0.9, 13);
    let times: Vec<u32> = (1..=12).collect();
    // Mis-indexed: the first observation sits at t = 1
    let series = RateSeries::from_parts(&times, &rates[1..]).unwrap();

    let fit = ParameterEstimator::new(&config)
        .fit_series(Product::Oil, &series, FixedQi::from_series(&series), None)
        .unwrap();
    let err = FitValidator::new(&config.validation, config.fitting.periods_per_year)
        .validate("E", &series, &fit, config.product(Product::Oil).monotonicity)
        .unwrap_err();

    match err {
        ValidationError::Failed {
            failed_checks,
            errors,
            ..
        } => {
            assert!(failed_checks.contains(&TIME_STARTS_AT_ZERO.to_string()));
            assert!(errors.iter().any(|e| e.contains("Time-zero alignment")));
        }
        other => panic!("expected strict validation failure, got {other}"),
    }
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn qi_is_never_fitted_by_any_strategy() {
    let rates = hyperbolic(750.0, 0.55, 0.08, 1.1, 30);
    for strategy in [
        StrategyKind::LeastSquares,
        StrategyKind::MonteCarlo,
        StrategyKind::DifferentialEvolution,
    ] {
        let mut config = DeclineConfig::default();
        config.fitting.strategy = strategy;
        config.fitting.trials = 10;
        config.fitting.retry_with_robust_strategy = false;

        let series = RateSeries::from_rates(&rates).unwrap();
        let conditioned = SignalConditioner::condition(&series, &config.conditioning).unwrap();
        let fit = ParameterEstimator::new(&config)
            .fit(Product::Oil, &conditioned)
            .unwrap();

        assert_eq!(fit.strategy, strategy);
        assert_eq!(fit.params.qi, conditioned.qi.value(), "{strategy}");
        assert_eq!(fit.qi_candidate, conditioned.qi, "{strategy}");
        assert_eq!(fit.predicted.first().rate, fit.params.qi, "{strategy}");
    }
}

#[test]
fn forecast_reproduces_fitted_predictions() {
    let config = DeclineConfig::default();
    let outcome = DeclinePipeline::new(&config)
        .process_well(&well("RT", Product::Gas, &hyperbolic(3000.0, 0.65, 0.06, 1.2, 36)));
    let fit = outcome.fit.unwrap();
    let series = outcome.conditioning.unwrap().series;

    let rebuilt = ForecastGenerator::from_fit(&fit, config.fitting.periods_per_year)
        .unwrap()
        .historical(&series)
        .unwrap();
    assert_eq!(rebuilt.rates(), fit.predicted.rates());
}

#[test]
fn conditioning_is_idempotent() {
    let config = DeclineConfig::default();
    let mut rates = hyperbolic(900.0, 0.6, 0.08, 1.0, 30);
    rates[12] *= 3.0;
    let series = RateSeries::from_rates(&rates).unwrap();

    let once = SignalConditioner::condition(&series, &config.conditioning).unwrap();
    let twice = SignalConditioner::condition(&once.series, &config.conditioning).unwrap();
    assert_eq!(once.series, twice.series);
    assert_eq!(once.qi, twice.qi);
}

#[test]
fn conditioning_is_idempotent_across_json() {
    let config = DeclineConfig::default();
    let mut rates = hyperbolic(900.0, 0.6, 0.08, 1.0, 30);
    rates[12] *= 3.0;
    let series = RateSeries::from_rates(&rates).unwrap();

    let once = SignalConditioner::condition(&series, &config.conditioning).unwrap();
    let json = serde_json::to_string(&once.series).unwrap();
    let restored: RateSeries = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, once.series);
    assert!(restored.is_conditioned_with(&config.conditioning));

    let twice = SignalConditioner::condition(&restored, &config.conditioning).unwrap();
    assert_eq!(twice.series, once.series);
    assert_eq!(twice.qi, once.qi);

    // A bare point array carries no stamp and is conditioned again
    let bare = serde_json::to_string(once.series.points()).unwrap();
    let unstamped: RateSeries = serde_json::from_str(&bare).unwrap();
    assert!(!unstamped.is_conditioned());
}

#[test]
fn batch_isolates_each_well() {
    let mut config = DeclineConfig::default();
    config.conditioning.smoothing_factor = 0;
    config.validation.strict = true;

    let wells = vec![
        well("GOOD-1", Product::Oil, &hyperbolic(800.0, 0.6, 0.08, 1.0, 36)),
        // Rising water cut cannot satisfy a decline fit in strict mode
        well("RISING", Product::Water, &[10.0, 12.0, 15.0, 19.0, 24.0, 30.0, 37.0, 45.0]),
        well("SHORT", Product::Oil, &[120.0, 110.0]),
        well("DEPLETED", Product::Gas, &[6.0, 5.5, 5.1, 4.8, 4.5]),
        well("GOOD-2", Product::Gas, &hyperbolic(2500.0, 0.7, 0.06, 1.2, 36)),
    ];
    let report = DeclinePipeline::new(&config).run_batch(&wells);

    let status = |id: &str| report.outcomes.iter().find(|o| o.well_id == id).unwrap().status;
    assert_eq!(status("GOOD-1"), WellStatus::Fitted);
    assert_eq!(status("RISING"), WellStatus::Failed);
    assert_eq!(status("SHORT"), WellStatus::Skipped);
    assert_eq!(status("DEPLETED"), WellStatus::Skipped);
    assert_eq!(status("GOOD-2"), WellStatus::Fitted);

    assert_eq!(report.summary.total, 5);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.skipped, 2);
    assert_eq!(report.summary.failed, 1);
    assert!(report.diagnostics().iter().any(|d| d.starts_with("RISING [water]")));
}

#[test]
fn type_curve_averages_wells() {
    let mut config = DeclineConfig::default();
    config.conditioning.smoothing_factor = 0;
    let wells = vec![
        well("TC-1", Product::Oil, &hyperbolic(600.0, 0.6, 0.08, 1.0, 24)),
        well("TC-2", Product::Oil, &hyperbolic(400.0, 0.6, 0.08, 1.0, 18)),
    ];

    let curve = DeclinePipeline::new(&config)
        .fit_type_curve(&wells, Product::Oil)
        .unwrap();
    assert_eq!(curve.wells, 2);
    assert_eq!(curve.points[0].mean_rate, 500.0);
    assert_eq!(curve.points[0].well_count, 2);
    assert_eq!(curve.points[23].well_count, 1);
    assert_eq!(curve.fit.params.qi, 500.0);
}
