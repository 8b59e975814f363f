//! Differential evolution (rand/1/bin) with a local polish
//!
//! Global stochastic search for pathological series where least squares
//! lands in a local minimum. The mutation factor is dithered per generation
//! and the search stops once the population's cost spread is small relative
//! to its mean. The best member is then polished with Levenberg–Marquardt.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::statistics::Statistics;
use tracing::debug;

use super::{
    DeclineObjective, EstimationError, FitStrategy, LevenbergMarquardt, ParameterBounds, Solution,
};
use crate::types::{DeclineVector, StrategyKind};

/// Differential evolution settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeOptions {
    pub population_size: usize,
    pub max_generations: usize,
    /// Mutation factor range, sampled once per generation
    pub mutation: (f64, f64),
    pub crossover: f64,
    /// Converged when std(costs) <= tolerance · |mean(costs)|
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for DeOptions {
    fn default() -> Self {
        Self {
            population_size: crate::config::defaults::DE_POPULATION_SIZE,
            max_generations: crate::config::defaults::DE_MAX_GENERATIONS,
            mutation: (0.5, 1.0),
            crossover: 0.7,
            tolerance: 0.01,
            seed: crate::config::defaults::FIT_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DifferentialEvolution {
    pub options: DeOptions,
    pub polish: LevenbergMarquardt,
}

impl DifferentialEvolution {
    pub fn new(options: DeOptions, polish: LevenbergMarquardt) -> Self {
        Self { options, polish }
    }

    /// Three distinct population indices, all different from `exclude`
    fn donors(rng: &mut StdRng, size: usize, exclude: usize) -> [usize; 3] {
        let mut picked = [exclude; 3];
        for k in 0..3 {
            loop {
                let candidate = rng.gen_range(0..size);
                if candidate != exclude && !picked[..k].contains(&candidate) {
                    picked[k] = candidate;
                    break;
                }
            }
        }
        picked
    }

    fn converged(&self, costs: &[f64]) -> bool {
        if costs.iter().any(|c| !c.is_finite()) {
            return false;
        }
        let mean = costs.mean();
        let spread = costs.population_std_dev();
        spread <= self.options.tolerance * mean.abs()
    }
}

impl FitStrategy for DifferentialEvolution {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DifferentialEvolution
    }

    fn estimate(
        &self,
        objective: &DeclineObjective,
        bounds: &ParameterBounds,
        guess: DeclineVector,
    ) -> Result<Solution, EstimationError> {
        let opts = &self.options;
        let size = opts.population_size.max(4);
        let lo = bounds.lower();
        let hi = bounds.upper();
        let mut rng = StdRng::seed_from_u64(opts.seed);

        // Initial population: the guess plus uniform samples
        let mut population: Vec<[f64; 2]> = Vec::with_capacity(size);
        population.push(bounds.clamp(guess).to_array());
        while population.len() < size {
            let mut x = [0.0; 2];
            for i in 0..DeclineVector::DIM {
                x[i] = lo[i] + (hi[i] - lo[i]) * rng.gen::<f64>();
            }
            population.push(x);
        }
        let mut costs: Vec<f64> = population
            .iter()
            .map(|x| objective.cost(DeclineVector::from_array(*x)))
            .collect();
        let mut evaluations = size;

        let mut generation = 0;
        let mut converged = false;
        while generation < opts.max_generations {
            let f = rng.gen_range(opts.mutation.0..opts.mutation.1);
            for j in 0..size {
                let [r1, r2, r3] = Self::donors(&mut rng, size, j);
                let forced = rng.gen_range(0..DeclineVector::DIM);
                let mut trial = population[j];
                for i in 0..DeclineVector::DIM {
                    if i == forced || rng.gen::<f64>() < opts.crossover {
                        let mutant =
                            population[r1][i] + f * (population[r2][i] - population[r3][i]);
                        trial[i] = mutant.clamp(lo[i], hi[i]);
                    }
                }
                let cost = objective.cost(DeclineVector::from_array(trial));
                evaluations += 1;
                if cost <= costs[j] {
                    population[j] = trial;
                    costs[j] = cost;
                }
            }
            generation += 1;
            if self.converged(&costs) {
                converged = true;
                break;
            }
        }

        let (best_index, best_cost) = costs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::INFINITY), |acc, (i, c)| if c < acc.1 { (i, c) } else { acc });

        if !converged || !best_cost.is_finite() {
            return Err(EstimationError::NonConvergence {
                strategy: StrategyKind::DifferentialEvolution,
                iterations: generation,
                cost: best_cost,
            });
        }

        debug!(generation, best_cost, "Differential evolution converged");

        let global = Solution::new(population[best_index], best_cost, generation, evaluations);
        match self
            .polish
            .minimize(objective, bounds, DeclineVector::from_array(population[best_index]))
        {
            Ok(polished) if polished.cost <= global.cost => Ok(Solution {
                iterations: generation + polished.iterations,
                evaluations: evaluations + polished.evaluations,
                ..polished
            }),
            _ => Ok(global),
        }
    }
}
