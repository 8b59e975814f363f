//! Bounded Levenberg–Marquardt
//!
//! Projected LM on `0.5 · Σ r²` with a forward-difference Jacobian. Bounds
//! are handled with an active set: a parameter sitting on a bound whose
//! gradient pushes it outward is frozen for the step, and every trial point
//! is clamped back into the box.

use tracing::trace;

use super::{
    DeclineObjective, EstimationError, FitStrategy, ParameterBounds, Solution,
};
use crate::types::{DeclineVector, StrategyKind};

/// Square root of f64 machine epsilon, the forward-difference step scale
const FD_STEP: f64 = 1.490_116_119_384_765_6e-8;

/// Damping above which no step can reduce the cost
const MAX_DAMPING: f64 = 1e16;
const MIN_DAMPING: f64 = 1e-15;
/// Diagonal floor so a flat direction still gets damped
const DIAGONAL_FLOOR: f64 = 1e-12;

/// Levenberg–Marquardt termination settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative cost reduction below which the fit has converged
    pub ftol: f64,
    /// Relative step size below which the fit has converged
    pub xtol: f64,
    /// Projected gradient below which the fit has converged
    pub gtol: f64,
    pub initial_damping: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: crate::config::defaults::LM_MAX_ITERATIONS,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
            initial_damping: 1e-3,
        }
    }
}

/// Deterministic bounded least squares from a single starting point
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenbergMarquardt {
    pub options: LmOptions,
}

impl LevenbergMarquardt {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            options: LmOptions {
                max_iterations,
                ..LmOptions::default()
            },
        }
    }

    /// Minimize the objective from `start` (clamped into the bounds)
    pub fn minimize(
        &self,
        objective: &DeclineObjective,
        bounds: &ParameterBounds,
        start: DeclineVector,
    ) -> Result<Solution, EstimationError> {
        let opts = &self.options;
        let lo = bounds.lower();
        let hi = bounds.upper();

        let mut x = bounds.clamp(start).to_array();
        let mut r = objective
            .residuals(DeclineVector::from_array(x))
            .ok_or_else(|| Self::failure(0, f64::INFINITY))?;
        let mut cost = half_sse(&r);
        let mut evaluations = 1;
        let mut damping = opts.initial_damping;

        for iteration in 0..opts.max_iterations {
            // Forward-difference Jacobian of the residuals
            let mut jac = [vec![0.0; r.len()], vec![0.0; r.len()]];
            for i in 0..DeclineVector::DIM {
                // Pinned parameters keep a zero column
                if hi[i] - lo[i] <= 0.0 {
                    continue;
                }
                let mut h = FD_STEP * x[i].abs().max(1.0);
                if x[i] + h > hi[i] {
                    h = -h;
                }
                if x[i] + h < lo[i] {
                    continue;
                }
                let mut xp = x;
                xp[i] += h;
                evaluations += 1;
                let rp = objective
                    .residuals(DeclineVector::from_array(xp))
                    .ok_or_else(|| Self::failure(iteration, cost))?;
                for (k, (a, b)) in rp.iter().zip(&r).enumerate() {
                    jac[i][k] = (a - b) / h;
                }
            }

            let g = [dot(&jac[0], &r), dot(&jac[1], &r)];
            let a = [
                [dot(&jac[0], &jac[0]), dot(&jac[0], &jac[1])],
                [dot(&jac[1], &jac[0]), dot(&jac[1], &jac[1])],
            ];

            // Active set: collapsed bounds or a bound the gradient pushes against
            let free: Vec<usize> = (0..DeclineVector::DIM)
                .filter(|&i| {
                    !(hi[i] - lo[i] <= 0.0
                        || (x[i] <= lo[i] && g[i] > 0.0)
                        || (x[i] >= hi[i] && g[i] < 0.0))
                })
                .collect();

            let projected_gradient = free.iter().map(|&i| g[i].abs()).fold(0.0, f64::max);
            if projected_gradient <= opts.gtol {
                return Ok(Solution::new(x, cost, iteration, evaluations));
            }

            // Increase damping until a step reduces the cost
            let mut accepted = None;
            while damping < MAX_DAMPING {
                if let Some(delta) = damped_step(&a, &g, &free, damping) {
                    let mut xn = [0.0; 2];
                    for i in 0..DeclineVector::DIM {
                        xn[i] = (x[i] + delta[i]).clamp(lo[i], hi[i]);
                    }
                    evaluations += 1;
                    if let Some(rn) = objective.residuals(DeclineVector::from_array(xn)) {
                        let cn = half_sse(&rn);
                        if cn.is_finite() && cn < cost {
                            accepted = Some((xn, rn, cn));
                            break;
                        }
                    }
                }
                damping *= 10.0;
            }

            // No descent direction left: the current point is a minimum
            let Some((xn, rn, cn)) = accepted else {
                return Ok(Solution::new(x, cost, iteration, evaluations));
            };

            let step = ((xn[0] - x[0]).powi(2) + (xn[1] - x[1]).powi(2)).sqrt();
            let x_norm = (x[0].powi(2) + x[1].powi(2)).sqrt();
            let reduction = cost - cn;
            x = xn;
            r = rn;
            cost = cn;
            damping = (damping / 10.0).max(MIN_DAMPING);

            trace!(iteration, cost, dei = x[0], b = x[1], "LM step accepted");

            if reduction <= opts.ftol * cost || step <= opts.xtol * (x_norm + opts.xtol) {
                return Ok(Solution::new(x, cost, iteration + 1, evaluations));
            }
        }

        Err(Self::failure(opts.max_iterations, cost))
    }

    fn failure(iterations: usize, cost: f64) -> EstimationError {
        EstimationError::NonConvergence {
            strategy: StrategyKind::LeastSquares,
            iterations,
            cost,
        }
    }
}

impl FitStrategy for LevenbergMarquardt {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LeastSquares
    }

    fn estimate(
        &self,
        objective: &DeclineObjective,
        bounds: &ParameterBounds,
        guess: DeclineVector,
    ) -> Result<Solution, EstimationError> {
        self.minimize(objective, bounds, guess)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn half_sse(r: &[f64]) -> f64 {
    0.5 * dot(r, r)
}

/// Solve `(A + λ·diag(A)) δ = -g` restricted to the free parameters
fn damped_step(a: &[[f64; 2]; 2], g: &[f64; 2], free: &[usize], damping: f64) -> Option<[f64; 2]> {
    let damped = |i: usize| a[i][i] + damping * a[i][i].max(DIAGONAL_FLOOR);
    let mut delta = [0.0; 2];
    match free {
        [i] => {
            delta[*i] = -g[*i] / damped(*i);
        }
        [_, _] => {
            let (a00, a11, a01) = (damped(0), damped(1), a[0][1]);
            let det = a00 * a11 - a01 * a01;
            delta[0] = (-g[0] * a11 + g[1] * a01) / det;
            delta[1] = (-g[1] * a00 + g[0] * a01) / det;
        }
        _ => return None,
    }
    delta.iter().all(|d| d.is_finite()).then_some(delta)
}
