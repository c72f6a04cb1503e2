//! Policy Iteration
//!
//! Alternates full policy evaluation with greedy improvement until an
//! improvement sweep leaves every action unchanged.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tabular_rl_core::config::{ensure_nonzero, ensure_positive};
use tabular_rl_core::{Mdp, QTable, Result, TabularPolicy, TabularValueFunction};

use crate::utils::SolveReport;

/// An action must beat the incumbent by more than this to replace it
const IMPROVEMENT_TOLERANCE: f64 = 1e-12;

/// Policy Iteration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyIterationConfig {
    /// Evaluation/improvement rounds before giving up
    pub max_iterations: usize,
    /// Evaluation stops once a sweep changes no value by `theta` or more
    pub theta: f64,
    /// Hard cap on evaluation sweeps per round
    pub max_evaluation_sweeps: usize,
}

impl Default for PolicyIterationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            theta: 1e-3,
            max_evaluation_sweeps: 10_000,
        }
    }
}

impl PolicyIterationConfig {
    /// Validate hyper-parameters
    pub fn validate(&self) -> Result<()> {
        ensure_nonzero("max_iterations", self.max_iterations)?;
        ensure_positive("theta", self.theta)?;
        ensure_nonzero("max_evaluation_sweeps", self.max_evaluation_sweeps)
    }
}

/// Policy Iteration solver over a known model
pub struct PolicyIteration<M: Mdp> {
    mdp: M,
    config: PolicyIterationConfig,
    policy: TabularPolicy<M::State, M::Action>,
    values: TabularValueFunction<M::State>,
    q_table: QTable<M::State, M::Action>,
}

impl<M: Mdp> PolicyIteration<M> {
    /// Create a solver starting from `policy`
    pub fn new(
        mdp: M,
        policy: TabularPolicy<M::State, M::Action>,
        config: PolicyIterationConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            mdp,
            config,
            policy,
            values: TabularValueFunction::new(0.0),
            q_table: QTable::new(1.0, 0.0),
        })
    }

    /// Create a solver starting from a uniformly random policy
    pub fn with_random_policy<R: Rng + ?Sized>(
        mdp: M,
        config: PolicyIterationConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let policy = TabularPolicy::random(&mdp, rng);
        Self::new(mdp, policy, config)
    }

    /// Evaluate the current policy in place; returns the number of sweeps
    ///
    /// States without a legal action, or without an action under the
    /// policy, keep their value.
    pub fn policy_evaluation(&mut self) -> usize {
        let gamma = self.mdp.discount_factor();
        let states = self.mdp.states();

        for sweep in 1..=self.config.max_evaluation_sweeps {
            let mut delta: f64 = 0.0;
            for state in &states {
                if self.mdp.is_terminal(state) {
                    continue;
                }
                let Some(action) = self.policy.action(state) else {
                    continue;
                };
                let old_value = self.values.value(state);
                let new_value = self.values.expected_return(&self.mdp, state, &action, gamma);
                self.values.update(state.clone(), new_value);
                delta = delta.max((old_value - new_value).abs());
            }

            debug!(sweep, delta, "policy evaluation sweep");
            if delta < self.config.theta {
                return sweep;
            }
        }

        warn!(
            sweeps = self.config.max_evaluation_sweeps,
            "policy evaluation hit the sweep cap before reaching theta"
        );
        self.config.max_evaluation_sweeps
    }

    /// Make the policy greedy with respect to the current values
    ///
    /// Returns the number of states whose action changed. The incumbent
    /// action survives ties so the loop cannot oscillate between equally
    /// good actions.
    pub fn improve(&mut self) -> usize {
        let gamma = self.mdp.discount_factor();
        let mut changed = 0;

        for state in self.mdp.states() {
            let actions = self.mdp.actions(&state);
            if actions.is_empty() {
                continue;
            }

            for action in &actions {
                let q = self.values.expected_return(&self.mdp, &state, action, gamma);
                self.q_table.update(state.clone(), action.clone(), q);
            }

            let Some((best_action, best_value)) = self.q_table.best_action_value(&state, &actions)
            else {
                continue;
            };

            let incumbent = self.policy.action(&state).filter(|a| actions.contains(a));
            let keep = incumbent.as_ref().map_or(false, |a| {
                self.q_table.q_value(&state, a) >= best_value - IMPROVEMENT_TOLERANCE
            });

            if !keep {
                self.policy.update(state, best_action);
                changed += 1;
            }
        }

        changed
    }

    /// Run until the policy is stable or `max_iterations` is reached
    pub fn solve(&mut self) -> SolveReport {
        self.run(self.config.max_iterations, false)
    }

    /// Run with an explicit iteration budget and return the final policy
    pub fn train(
        &mut self,
        max_iterations: usize,
        verbose: bool,
    ) -> Result<(TabularPolicy<M::State, M::Action>, SolveReport)> {
        ensure_nonzero("max_iterations", max_iterations)?;
        let report = self.run(max_iterations, verbose);
        Ok((self.policy.clone(), report))
    }

    fn run(&mut self, max_iterations: usize, verbose: bool) -> SolveReport {
        for iteration in 1..=max_iterations {
            let sweeps = self.policy_evaluation();
            let changed = self.improve();

            debug!(iteration, sweeps, changed, "policy iteration round");
            if verbose {
                info!(iteration, sweeps, changed, "policy iteration progress");
            }

            if changed == 0 {
                info!(iterations = iteration, "policy iteration converged");
                return SolveReport {
                    iterations: iteration,
                    converged: true,
                };
            }
        }

        warn!(max_iterations, "policy iteration did not converge");
        SolveReport {
            iterations: max_iterations,
            converged: false,
        }
    }

    /// Current policy
    pub fn policy(&self) -> &TabularPolicy<M::State, M::Action> {
        &self.policy
    }

    /// Value function of the last evaluated policy
    pub fn value_function(&self) -> &TabularValueFunction<M::State> {
        &self.values
    }

    /// Q-values from the last improvement sweep
    pub fn q_table(&self) -> &QTable<M::State, M::Action> {
        &self.q_table
    }

    /// Underlying model
    pub fn mdp(&self) -> &M {
        &self.mdp
    }

    /// Active configuration
    pub fn config(&self) -> &PolicyIterationConfig {
        &self.config
    }
}
