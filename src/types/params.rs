//! Decline parameter types: Product, DeclineParams, DeclineVector

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::FixedQi;

/// Produced phase of a well
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    Oil,
    Gas,
    Water,
}

impl Product {
    pub const ALL: [Product; 3] = [Product::Oil, Product::Gas, Product::Water];

    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Oil => "oil",
            Product::Gas => "gas",
            Product::Water => "water",
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalid decline parameter tuple
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Qi must be finite and > 0 (got {0})")]
    InvalidQi(f64),

    #[error("Dei must be in [0, 1) (got {0})")]
    InvalidDei(f64),

    #[error("Def must be in [0, 1) (got {0})")]
    InvalidDef(f64),

    #[error("b must be in [0, 2] (got {0})")]
    InvalidB(f64),

    #[error("periods_per_year must be finite and > 0 (got {0})")]
    InvalidPeriodsPerYear(f64),
}

/// Upper limit of the hyperbolic exponent
pub const MAX_B: f64 = 2.0;

/// Full modified-hyperbolic parameter set.
///
/// `dei` and `def` are effective annual decline fractions, `b` is the
/// hyperbolic exponent. `def` is not required to be below `dei` here; the
/// fit validator reports that relationship.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeclineParams {
    pub qi: f64,
    pub dei: f64,
    pub def: f64,
    pub b: f64,
}

impl DeclineParams {
    pub fn new(qi: f64, dei: f64, def: f64, b: f64) -> Result<Self, ModelError> {
        if !qi.is_finite() || qi <= 0.0 {
            return Err(ModelError::InvalidQi(qi));
        }
        if !(0.0..1.0).contains(&dei) {
            return Err(ModelError::InvalidDei(dei));
        }
        if !(0.0..1.0).contains(&def) {
            return Err(ModelError::InvalidDef(def));
        }
        if !(0.0..=MAX_B).contains(&b) {
            return Err(ModelError::InvalidB(b));
        }
        Ok(Self { qi, dei, def, b })
    }

    /// Combine the fixed boundary condition with optimizer output
    pub fn from_parts(qi: FixedQi, vector: DeclineVector, def: f64) -> Result<Self, ModelError> {
        Self::new(qi.value(), vector.dei, def, vector.b)
    }
}

/// The free parameters of a fit: exactly `Dei` and `b`.
///
/// There is no Qi field; the initial rate travels separately as
/// a `FixedQi` and cannot be moved by any optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeclineVector {
    pub dei: f64,
    pub b: f64,
}

impl DeclineVector {
    pub const DIM: usize = 2;

    pub fn new(dei: f64, b: f64) -> Self {
        Self { dei, b }
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.dei, self.b]
    }

    pub fn from_array(values: [f64; 2]) -> Self {
        Self {
            dei: values[0],
            b: values[1],
        }
    }
}
