//! Decline Model - modified Arps rate, cumulative and decline-rate equations
//!
//! Pure functions over a validated parameter set. Time is measured in
//! production periods; `Dei`/`Def` are effective annual fractions and
//! `periods_per_year` converts between the two.
//!
//! ## Key Features
//! - Effective → nominal decline conversion (hyperbolic and exponential)
//! - Terminal transition to an exponential tail (modified hyperbolic)
//! - Closed-form cumulative production for every branch
//! - Abandonment time (first time the curve reaches a limit rate)
//!
//! `rate(0)` is `Qi` exactly: every branch evaluates `Qi * exp(0)`.

use serde::{Deserialize, Serialize};

use crate::types::{DeclineParams, ModelError};

/// Below this b the hyperbolic branch is evaluated as an exponential.
///
/// Small enough that forward-difference Jacobian steps around `b = 0` stay on
/// the hyperbolic branch (evaluated through `ln_1p`/`exp_m1`).
pub const B_EPS: f64 = 1e-10;

/// Tolerance for classifying b = 1 as harmonic
const HARMONIC_TOLERANCE: f64 = 1e-6;

/// Which equation governs the curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineVariant {
    Exponential,
    Harmonic,
    Hyperbolic,
    /// Hyperbolic with an exponential terminal tail
    ModifiedHyperbolic,
}

impl std::fmt::Display for DeclineVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclineVariant::Exponential => write!(f, "exponential"),
            DeclineVariant::Harmonic => write!(f, "harmonic"),
            DeclineVariant::Hyperbolic => write!(f, "hyperbolic"),
            DeclineVariant::ModifiedHyperbolic => write!(f, "modified_hyperbolic"),
        }
    }
}

/// Nominal annual decline implied by an effective annual decline.
///
/// `b > 0`: `((1 - Dei)^(-b) - 1) / b`, `b = 0`: `-ln(1 - Dei)`.
/// Evaluated as `exp_m1(-b ln(1 - Dei)) / b` so it stays accurate as b → 0.
pub fn nominal_from_effective(dei: f64, b: f64) -> f64 {
    let log_survival = (-dei).ln_1p();
    if b < B_EPS {
        -log_survival
    } else {
        (-b * log_survival).exp_m1() / b
    }
}

/// Effective annual decline implied by a nominal annual decline.
pub fn effective_from_nominal(dn: f64, b: f64) -> f64 {
    if b < B_EPS {
        -(-dn).exp_m1()
    } else {
        1.0 - (-(b * dn).ln_1p() / b).exp()
    }
}

/// Modified Arps curve for one parameter set.
///
/// Precomputes the per-period nominal declines and the transition time so
/// evaluating a grid is a tight loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArpsModel {
    params: DeclineParams,
    periods_per_year: f64,
    /// Initial nominal decline per period
    di: f64,
    /// Terminal nominal decline per period
    dmin: f64,
    /// Periods until the hyperbolic decline reaches `dmin`
    t_trans: Option<f64>,
}

impl ArpsModel {
    pub fn new(params: DeclineParams, periods_per_year: f64) -> Result<Self, ModelError> {
        if !periods_per_year.is_finite() || periods_per_year <= 0.0 {
            return Err(ModelError::InvalidPeriodsPerYear(periods_per_year));
        }
        let di = nominal_from_effective(params.dei, params.b) / periods_per_year;
        let dmin = -(-params.def).ln_1p() / periods_per_year;

        // No transition when the hyperbolic decline never falls to the floor
        let t_trans = if params.b >= B_EPS && dmin > 0.0 && di > dmin {
            Some((di / dmin - 1.0) / (params.b * di))
        } else {
            None
        };

        Ok(Self {
            params,
            periods_per_year,
            di,
            dmin,
            t_trans,
        })
    }

    pub fn params(&self) -> &DeclineParams {
        &self.params
    }

    pub fn periods_per_year(&self) -> f64 {
        self.periods_per_year
    }

    /// Periods after which the exponential tail applies
    pub fn transition_time(&self) -> Option<f64> {
        self.t_trans
    }

    /// Initial nominal decline, annual
    pub fn initial_nominal_decline(&self) -> f64 {
        self.di * self.periods_per_year
    }

    /// Terminal nominal decline, annual
    pub fn terminal_nominal_decline(&self) -> f64 {
        self.dmin * self.periods_per_year
    }

    pub fn variant(&self) -> DeclineVariant {
        let b = self.params.b;
        if b < B_EPS {
            DeclineVariant::Exponential
        } else if self.t_trans.is_some() {
            DeclineVariant::ModifiedHyperbolic
        } else if (b - 1.0).abs() < HARMONIC_TOLERANCE {
            DeclineVariant::Harmonic
        } else {
            DeclineVariant::Hyperbolic
        }
    }

    // ========================================================================
    // Rate
    // ========================================================================

    /// Hyperbolic (or exponential, b = 0) branch without the terminal tail
    fn hyperbolic_rate(&self, t: f64) -> f64 {
        let b = self.params.b;
        if b < B_EPS {
            self.params.qi * (-self.di * t).exp()
        } else {
            self.params.qi * (-(b * self.di * t).ln_1p() / b).exp()
        }
    }

    /// Rate at time `t` (periods)
    pub fn rate(&self, t: f64) -> f64 {
        match self.t_trans {
            Some(tt) if t > tt => self.hyperbolic_rate(tt) * (-self.dmin * (t - tt)).exp(),
            _ => self.hyperbolic_rate(t),
        }
    }

    /// Rates over a time grid
    pub fn rates(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.rate(t)).collect()
    }

    // ========================================================================
    // Cumulative
    // ========================================================================

    fn hyperbolic_cumulative(&self, t: f64) -> f64 {
        let qi = self.params.qi;
        let b = self.params.b;
        let d = self.di;

        if d <= 0.0 {
            return qi * t;
        }
        if b < B_EPS {
            -qi / d * (-d * t).exp_m1()
        } else if (b - 1.0).abs() < HARMONIC_TOLERANCE {
            qi / d * (d * t).ln_1p()
        } else {
            // (1 + bdt)^(1 - 1/b) via logs
            let growth = ((1.0 - 1.0 / b) * (b * d * t).ln_1p()).exp();
            qi / ((1.0 - b) * d) * (1.0 - growth)
        }
    }

    /// Cumulative production over `[0, t]` in rate × period units
    pub fn cumulative(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        match self.t_trans {
            Some(tt) if t > tt => {
                let q_tt = self.hyperbolic_rate(tt);
                self.hyperbolic_cumulative(tt) - q_tt / self.dmin * (-self.dmin * (t - tt)).exp_m1()
            }
            _ => self.hyperbolic_cumulative(t),
        }
    }

    pub fn cumulatives(&self, times: &[f64]) -> Vec<f64> {
        times.iter().map(|&t| self.cumulative(t)).collect()
    }

    // ========================================================================
    // Decline rates
    // ========================================================================

    /// Instantaneous nominal decline at `t`, annual
    pub fn nominal_decline(&self, t: f64) -> f64 {
        let per_period = match self.t_trans {
            Some(tt) if t > tt => self.dmin,
            _ => self.di / (1.0 + self.params.b * self.di * t.max(0.0)),
        };
        per_period * self.periods_per_year
    }

    /// Effective annual decline at `t`
    pub fn effective_decline(&self, t: f64) -> f64 {
        let dn = self.nominal_decline(t);
        match self.t_trans {
            Some(tt) if t > tt => effective_from_nominal(dn, 0.0),
            _ => effective_from_nominal(dn, self.params.b),
        }
    }

    // ========================================================================
    // Abandonment
    // ========================================================================

    /// First time the curve reaches `q_limit`, or None if it never does
    pub fn time_to_rate(&self, q_limit: f64) -> Option<f64> {
        let qi = self.params.qi;
        if !q_limit.is_finite() || q_limit <= 0.0 {
            return None;
        }
        if q_limit >= qi {
            return Some(0.0);
        }

        let b = self.params.b;
        let ratio = qi / q_limit;
        let hyperbolic_t = if self.di <= 0.0 {
            None
        } else if b < B_EPS {
            Some(ratio.ln() / self.di)
        } else {
            Some((b * ratio.ln()).exp_m1() / (b * self.di))
        };

        match (self.t_trans, hyperbolic_t) {
            (Some(tt), Some(t)) if t <= tt => Some(t),
            (Some(tt), _) => {
                let q_tt = self.hyperbolic_rate(tt);
                Some(tt + (q_tt / q_limit).ln() / self.dmin)
            }
            (None, t) => t,
        }
    }
}
