//! Randomized-restart least squares
//!
//! Runs Levenberg–Marquardt from the configured guess plus `trials` starting
//! points drawn uniformly from the bounds, and keeps the converged run with
//! the lowest cost. Starting points come from a seeded `StdRng`, so the
//! result is reproducible; the runs themselves execute on the rayon pool.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use super::{
    DeclineObjective, EstimationError, FitStrategy, LevenbergMarquardt, ParameterBounds, Solution,
};
use crate::types::{DeclineVector, StrategyKind};

#[derive(Debug, Clone, Copy)]
pub struct MonteCarlo {
    pub trials: usize,
    pub seed: u64,
    pub local: LevenbergMarquardt,
}

impl MonteCarlo {
    pub fn new(trials: usize, seed: u64, max_iterations: usize) -> Self {
        Self {
            trials,
            seed,
            local: LevenbergMarquardt::new(max_iterations),
        }
    }

    /// Guess first, then `trials` uniform samples from the bounds
    pub fn starting_points(&self, bounds: &ParameterBounds, guess: DeclineVector) -> Vec<DeclineVector> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let lo = bounds.lower();
        let hi = bounds.upper();
        let mut starts = Vec::with_capacity(self.trials + 1);
        starts.push(bounds.clamp(guess));
        for _ in 0..self.trials {
            let mut x = [0.0; 2];
            for i in 0..DeclineVector::DIM {
                x[i] = if hi[i] > lo[i] {
                    rng.gen_range(lo[i]..=hi[i])
                } else {
                    lo[i]
                };
            }
            starts.push(DeclineVector::from_array(x));
        }
        starts
    }
}

impl FitStrategy for MonteCarlo {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MonteCarlo
    }

    fn estimate(
        &self,
        objective: &DeclineObjective,
        bounds: &ParameterBounds,
        guess: DeclineVector,
    ) -> Result<Solution, EstimationError> {
        let starts = self.starting_points(bounds, guess);
        let runs: Vec<Result<Solution, EstimationError>> = starts
            .par_iter()
            .map(|&start| self.local.minimize(objective, bounds, start))
            .collect();

        let evaluations: usize = runs
            .iter()
            .map(|r| match r {
                Ok(s) => s.evaluations,
                Err(_) => 0,
            })
            .sum();
        let converged = runs.iter().filter(|r| r.is_ok()).count();

        // Lowest cost wins; ties go to the earliest start
        let best = runs
            .into_iter()
            .filter_map(Result::ok)
            .reduce(|best, s| if s.cost < best.cost { s } else { best });

        debug!(
            trials = starts.len(),
            converged,
            best_cost = ?best.as_ref().map(|s| s.cost),
            "Monte Carlo restarts finished"
        );

        match best {
            Some(mut solution) => {
                solution.evaluations = evaluations;
                Ok(solution)
            }
            None => Err(EstimationError::NonConvergence {
                strategy: StrategyKind::MonteCarlo,
                iterations: starts.len(),
                cost: f64::INFINITY,
            }),
        }
    }
}
