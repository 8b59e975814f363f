//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use crate::types::Product;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

const STATIC_KEYS: &[&str] = &[
    // [fitting]
    "fitting",
    "fitting.strategy",
    "fitting.trials",
    "fitting.max_iterations",
    "fitting.population_size",
    "fitting.max_generations",
    "fitting.seed",
    "fitting.min_points",
    "fitting.min_points_full_fit",
    "fitting.periods_per_year",
    "fitting.retry_with_robust_strategy",
    // [conditioning]
    "conditioning",
    "conditioning.smoothing_factor",
    "conditioning.segment_role",
    "conditioning.min_segment_length",
    "conditioning.outliers",
    "conditioning.outliers.enabled",
    "conditioning.outliers.window",
    "conditioning.outliers.z_threshold",
    "conditioning.outliers.min_array_size",
    "conditioning.changepoint",
    "conditioning.changepoint.enabled",
    "conditioning.changepoint.penalty",
    "conditioning.changepoint.noise_floor",
    "conditioning.changepoint.min_segment_size",
    // [validation]
    "validation",
    "validation.strict",
    "validation.time_zero_tolerance",
    "validation.first_point_warning_pct",
    "validation.first_point_good_pct",
    "validation.monotonic_tolerance",
    "validation.r2_minimum",
    "validation.r2_desired",
    "validation.residual_bias_ratio",
    "validation.residual_bias_floor",
    // [b_estimation]
    "b_estimation",
    "b_estimation.enabled",
    "b_estimation.min_b",
    "b_estimation.max_b",
    // [products]
    "products",
];

const PRODUCT_KEYS: &[&str] = &[
    "terminal_decline",
    "abandonment_rate",
    "monotonicity",
    "initial_decline",
    "initial_decline.min",
    "initial_decline.guess",
    "initial_decline.max",
    "b_factor",
    "b_factor.min",
    "b_factor.guess",
    "b_factor.max",
];

/// Returns the complete set of valid dotted key paths for DeclineConfig.
///
/// Product sections share one layout, so their keys are expanded per product.
/// Any new field added to DeclineConfig must be added here too.
pub fn known_config_keys() -> HashSet<String> {
    let mut keys: HashSet<String> = STATIC_KEYS.iter().map(|k| k.to_string()).collect();
    for product in Product::ALL {
        let section = format!("products.{product}");
        for key in PRODUCT_KEYS {
            keys.insert(format!("{section}.{key}"));
        }
        keys.insert(section);
    }
    keys
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<String>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.clone())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed DeclineConfig.
///
/// Returns (errors, warnings): errors are impossible values that must be
/// rejected; warnings are suspicious but fittable.
pub fn validate_physical_ranges(
    config: &super::DeclineConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for product in Product::ALL {
        let p = config.product(product);

        // Def above the initial decline guess means the curve starts on its tail
        if p.terminal_decline > p.initial_decline.guess {
            warnings.push(ValidationWarning {
                field: format!("products.{product}.terminal_decline"),
                message: format!(
                    "products.{product}.terminal_decline = {:.3} exceeds initial_decline.guess = {:.3}",
                    p.terminal_decline, p.initial_decline.guess
                ),
                suggestion: None,
            });
        }

        // b above ~1.5 is only seen in unconventional transient flow
        if p.b_factor.max > 1.5 && p.b_factor.guess > 1.5 {
            warnings.push(ValidationWarning {
                field: format!("products.{product}.b_factor.guess"),
                message: format!(
                    "products.{product}.b_factor.guess = {:.2} is outside typical range (0-1.5)",
                    p.b_factor.guess
                ),
                suggestion: None,
            });
        }

        if !p.abandonment_rate.is_finite() {
            errors.push(format!(
                "products.{product}.abandonment_rate must be finite"
            ));
        }
    }

    // Production data is reported daily, weekly, monthly, quarterly or yearly
    let ppy = config.fitting.periods_per_year;
    if ppy.is_finite() && ![1.0, 4.0, 12.0, 52.0, 365.0].contains(&ppy) {
        warnings.push(ValidationWarning {
            field: "fitting.periods_per_year".to_string(),
            message: format!(
                "fitting.periods_per_year = {ppy} is not a standard reporting frequency (1, 4, 12, 52, 365)"
            ),
            suggestion: None,
        });
    }

    if config.conditioning.smoothing_factor > 10 {
        warnings.push(ValidationWarning {
            field: "conditioning.smoothing_factor".to_string(),
            message: format!(
                "conditioning.smoothing_factor = {} flattens most decline structure (typical 0-5)",
                config.conditioning.smoothing_factor
            ),
            suggestion: None,
        });
    }

    let z = config.conditioning.outliers.z_threshold;
    if z > 0.0 && z < 2.0 {
        warnings.push(ValidationWarning {
            field: "conditioning.outliers.z_threshold".to_string(),
            message: format!(
                "conditioning.outliers.z_threshold = {z:.2} rejects ordinary noise (typical 2.5-4)"
            ),
            suggestion: None,
        });
    }

    if !(0.0..=1.0).contains(&config.validation.r2_minimum)
        || !(0.0..=1.0).contains(&config.validation.r2_desired)
    {
        errors.push(format!(
            "validation R² thresholds must lie in [0, 1] (got {:.2} / {:.2})",
            config.validation.r2_minimum, config.validation.r2_desired
        ));
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeclineConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("smoothng_factor", "smoothing_factor"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [conditioning]
            [conditioning.outliers]
            z_threshold = 3.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"conditioning".to_string()));
        assert!(keys.contains(&"conditioning.outliers".to_string()));
        assert!(keys.contains(&"conditioning.outliers.z_threshold".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[conditioning]
smoothng_factor = 2
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("smoothng_factor"));
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("conditioning.smoothing_factor")
        );
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[fitting]
strategy = "monte_carlo"
trials = 20

[products.water]
terminal_decline = 0.1
monotonicity = "skip"
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
    }

    #[test]
    fn test_unknown_product_section_produces_warning() {
        let toml_str = r#"
[products.condensate]
terminal_decline = 0.1
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.iter().any(|w| w.field == "products.condensate"));
    }

    #[test]
    fn test_known_keys_cover_every_product() {
        let known = known_config_keys();
        for product in ["oil", "gas", "water"] {
            assert!(known.contains(&format!("products.{product}.b_factor.guess")));
            assert!(known.contains(&format!("products.{product}.monotonicity")));
        }
        assert!(known.contains("fitting.periods_per_year"));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_physical_range_defaults_clean() {
        let config = DeclineConfig::default();
        let (errors, warnings) = validate_physical_ranges(&config);
        assert!(errors.is_empty(), "Defaults should produce no errors: {:?}", errors);
        assert!(warnings.is_empty(), "Defaults should produce no warnings: {:?}", warnings);
    }

    #[test]
    fn test_terminal_above_initial_guess_warns() {
        let mut config = DeclineConfig::default();
        config.products.oil.terminal_decline = 0.6;
        let (_, warnings) = validate_physical_ranges(&config);
        assert!(warnings
            .iter()
            .any(|w| w.field == "products.oil.terminal_decline"));
    }

    #[test]
    fn test_odd_reporting_frequency_warns() {
        let mut config = DeclineConfig::default();
        config.fitting.periods_per_year = 13.0;
        let (_, warnings) = validate_physical_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "fitting.periods_per_year"));
    }
}
