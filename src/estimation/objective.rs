//! Least-squares objective over the free decline parameters
//!
//! `Qi` and `Def` are captured at construction; the optimizer only ever
//! passes a `DeclineVector`, so it has no way to move either of them.

use crate::decline::ArpsModel;
use crate::types::{DeclineParams, DeclineVector, FixedQi, RateSeries};

/// Sum-of-squares objective for one conditioned series
#[derive(Debug, Clone)]
pub struct DeclineObjective {
    times: Vec<f64>,
    observed: Vec<f64>,
    qi: FixedQi,
    def: f64,
    periods_per_year: f64,
}

impl DeclineObjective {
    pub fn new(series: &RateSeries, qi: FixedQi, def: f64, periods_per_year: f64) -> Self {
        Self {
            times: series.times(),
            observed: series.rates(),
            qi,
            def,
            periods_per_year,
        }
    }

    pub fn qi(&self) -> FixedQi {
        self.qi
    }

    pub fn def(&self) -> f64 {
        self.def
    }

    pub fn periods_per_year(&self) -> f64 {
        self.periods_per_year
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    pub fn observed(&self) -> &[f64] {
        &self.observed
    }

    /// Model for a candidate vector; None if the vector leaves the valid domain
    pub fn model(&self, v: DeclineVector) -> Option<ArpsModel> {
        let params = DeclineParams::from_parts(self.qi, v, self.def).ok()?;
        ArpsModel::new(params, self.periods_per_year).ok()
    }

    /// Model rates at the observed times
    pub fn predict(&self, v: DeclineVector) -> Option<Vec<f64>> {
        self.model(v).map(|m| m.rates(&self.times))
    }

    /// observed - predicted
    pub fn residuals(&self, v: DeclineVector) -> Option<Vec<f64>> {
        self.predict(v).map(|pred| {
            self.observed
                .iter()
                .zip(&pred)
                .map(|(o, p)| o - p)
                .collect()
        })
    }

    /// Half the sum of squared residuals; infinite outside the valid domain
    pub fn cost(&self, v: DeclineVector) -> f64 {
        match self.residuals(v) {
            Some(r) => {
                let c = 0.5 * r.iter().map(|x| x * x).sum::<f64>();
                if c.is_finite() {
                    c
                } else {
                    f64::INFINITY
                }
            }
            None => f64::INFINITY,
        }
    }
}
