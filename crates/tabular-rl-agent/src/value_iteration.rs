//! Value Iteration with synchronous Bellman optimality backups

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tabular_rl_core::config::{ensure_nonzero, ensure_positive};
use tabular_rl_core::{Mdp, Result, TabularPolicy, TabularValueFunction};

use crate::utils::SolveReport;

/// Value Iteration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueIterationConfig {
    /// Sweeps before giving up
    pub max_iterations: usize,
    /// Stop once a sweep changes no value by `theta` or more
    pub theta: f64,
}

impl Default for ValueIterationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            theta: 1e-4,
        }
    }
}

impl ValueIterationConfig {
    /// Validate hyper-parameters
    pub fn validate(&self) -> Result<()> {
        ensure_nonzero("max_iterations", self.max_iterations)?;
        ensure_positive("theta", self.theta)
    }
}

/// Value Iteration solver over a known model
pub struct ValueIteration<M: Mdp> {
    mdp: M,
    config: ValueIterationConfig,
    values: TabularValueFunction<M::State>,
}

impl<M: Mdp> ValueIteration<M> {
    /// Create a solver with an all-zero value table
    pub fn new(mdp: M, config: ValueIterationConfig) -> Result<Self> {
        Self::with_values(mdp, TabularValueFunction::new(0.0), config)
    }

    /// Create a solver from a pre-seeded value table
    ///
    /// Values of terminal states are never touched, so seeding them fixes
    /// their worth.
    pub fn with_values(
        mdp: M,
        values: TabularValueFunction<M::State>,
        config: ValueIterationConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { mdp, config, values })
    }

    /// One synchronous sweep; returns the largest absolute change
    ///
    /// Every backup reads the values from before the sweep.
    pub fn sweep(&mut self) -> f64 {
        let gamma = self.mdp.discount_factor();
        let old = self.values.clone();
        let mut delta: f64 = 0.0;

        for state in self.mdp.states() {
            let Some((_, best)) = old.greedy_action(&self.mdp, &state, gamma) else {
                continue;
            };
            delta = delta.max((old.value(&state) - best).abs());
            self.values.update(state, best);
        }

        delta
    }

    /// Sweep until converged or `max_iterations` is reached
    pub fn solve(&mut self) -> SolveReport {
        self.run(self.config.max_iterations, false)
    }

    /// Run with an explicit sweep budget and return the greedy policy
    pub fn train(
        &mut self,
        max_iterations: usize,
        verbose: bool,
    ) -> Result<(TabularPolicy<M::State, M::Action>, SolveReport)> {
        ensure_nonzero("max_iterations", max_iterations)?;
        let report = self.run(max_iterations, verbose);
        Ok((self.extract_policy(), report))
    }

    fn run(&mut self, max_iterations: usize, verbose: bool) -> SolveReport {
        for iteration in 1..=max_iterations {
            let delta = self.sweep();
            debug!(iteration, delta, "value iteration sweep");
            if verbose {
                info!(iteration, delta, "value iteration progress");
            }

            if delta < self.config.theta {
                info!(iterations = iteration, "value iteration converged");
                return SolveReport {
                    iterations: iteration,
                    converged: true,
                };
            }
        }

        warn!(max_iterations, "value iteration did not converge");
        SolveReport {
            iterations: max_iterations,
            converged: false,
        }
    }

    /// Greedy policy from the current values
    pub fn extract_policy(&self) -> TabularPolicy<M::State, M::Action> {
        self.values
            .extract_policy(&self.mdp, self.mdp.discount_factor())
    }

    /// Current value table
    pub fn value_function(&self) -> &TabularValueFunction<M::State> {
        &self.values
    }

    /// Underlying model
    pub fn mdp(&self) -> &M {
        &self.mdp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tabular_rl_env::{Direction, GridWorld, GridWorldConfig};

    fn grid(obstacles: Vec<(usize, usize)>) -> GridWorld {
        GridWorld::new(GridWorldConfig {
            obstacles,
            seed: Some(0),
            ..GridWorldConfig::default()
        })
        .unwrap()
    }

    fn open_grid_solver() -> ValueIteration<GridWorld> {
        ValueIteration::new(grid(Vec::new()), ValueIterationConfig::default()).unwrap()
    }

    #[test]
    fn values_decay_by_gamma_per_step_from_goal() {
        let mut solver = open_grid_solver();
        let report = solver.solve();
        assert!(report.converged);

        let values = solver.value_function();
        // Entering the goal pays 1, so the goal is worth 0 and each step back costs one γ.
        assert_abs_diff_eq!(values.value(&(0, 3)), 0.0);
        assert_abs_diff_eq!(values.value(&(0, 2)), 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(values.value(&(0, 1)), 0.9, epsilon = 1e-4);
        assert_abs_diff_eq!(values.value(&(1, 1)), 0.81, epsilon = 1e-4);
    }

    #[test]
    fn sweeps_are_synchronous() {
        let mut solver = open_grid_solver();
        solver.sweep();
        // After one sweep only cells next to the goal can have learned anything.
        assert_abs_diff_eq!(solver.value_function().value(&(0, 2)), 1.0);
        assert_abs_diff_eq!(solver.value_function().value(&(0, 1)), 0.0);
        assert_abs_diff_eq!(solver.value_function().value(&(1, 2)), 0.0);
    }

    #[test]
    fn extracted_policy_routes_around_obstacles() {
        let walls = grid(vec![(1, 1), (2, 1), (1, 2)]);
        let mut solver = ValueIteration::new(walls, ValueIterationConfig::default()).unwrap();
        let (policy, report) = solver.train(100, false).unwrap();
        assert!(report.converged);
        assert_eq!(policy.action(&(0, 0)), Some(Direction::Right));
        assert_eq!(policy.action(&(3, 3)), Some(Direction::Up));
        assert_eq!(policy.action(&(0, 3)), None);
    }

    #[test]
    fn cap_reports_non_convergence() {
        let config = ValueIterationConfig {
            max_iterations: 2,
            theta: 1e-9,
        };
        let mut solver = ValueIteration::new(grid(Vec::new()), config).unwrap();
        assert_eq!(
            solver.solve(),
            SolveReport {
                iterations: 2,
                converged: false
            }
        );
    }

    #[test]
    fn seeded_terminal_values_are_kept() {
        let seeded = TabularValueFunction::with_values(0.0, [((0, 3), 5.0)]);
        let mut solver =
            ValueIteration::with_values(grid(Vec::new()), seeded, ValueIterationConfig::default())
                .unwrap();
        solver.solve();
        let values = solver.value_function();
        assert_eq!(values.value(&(0, 3)), 5.0);
        assert_abs_diff_eq!(values.value(&(0, 2)), 1.0 + 0.9 * 5.0, epsilon = 1e-3);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let mut solver = open_grid_solver();
        assert!(solver.train(0, false).is_err());
    }
}
