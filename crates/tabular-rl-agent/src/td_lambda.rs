//! TD(λ) with replacing eligibility traces
//!
//! Every TD error is spread over all recently visited states in proportion
//! to their trace. λ = 0 reduces to TD(0); λ = 1 approaches Monte Carlo
//! propagation.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tabular_rl_core::config::ensure_in_range;
use tabular_rl_core::{
    Environment, EpsilonGreedy, Result, TabularPolicy, TabularValueFunction, Transition,
};

use crate::td::{lookahead_action, TdConfig};
use crate::traces::ReplacingTraces;
use crate::utils::{trailing_mean, EpisodeStats, Schedule, TrainingSummary};

/// TD(λ) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TdLambdaConfig {
    /// Shared TD configuration
    #[serde(flatten)]
    pub base: TdConfig,
    /// Trace decay λ in `[0, 1]`
    pub lambda: f64,
}

impl Default for TdLambdaConfig {
    fn default() -> Self {
        Self {
            base: TdConfig::default(),
            lambda: 0.8,
        }
    }
}

impl TdLambdaConfig {
    /// Validate hyper-parameters
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        ensure_in_range("lambda", self.lambda, 0.0, 1.0)
    }
}

/// TD(λ) learner
pub struct TdLambda<E: Environment, R: Rng = StdRng> {
    env: E,
    config: TdLambdaConfig,
    values: TabularValueFunction<E::State>,
    traces: ReplacingTraces<E::State>,
    policy: TabularPolicy<E::State, E::Action>,
    selector: EpsilonGreedy,
    rng: R,
    episodes_trained: usize,
}

impl<E: Environment> TdLambda<E> {
    /// Create a learner whose generator is seeded from `config.base.seed`
    pub fn new(env: E, config: TdLambdaConfig) -> Result<Self> {
        let rng = config.base.rng();
        Self::with_rng(env, config, rng)
    }
}

impl<E: Environment, R: Rng> TdLambda<E, R> {
    /// Create a learner drawing exploration randomness from `rng`
    pub fn with_rng(env: E, config: TdLambdaConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let selector = EpsilonGreedy::new(config.base.exploration.value(0));
        Ok(Self {
            env,
            config,
            values: TabularValueFunction::new(0.0),
            traces: ReplacingTraces::new(),
            policy: TabularPolicy::new(None),
            selector,
            rng,
            episodes_trained: 0,
        })
    }

    /// Apply one transition `(X, R, Y)` to every traced state; returns δ
    pub fn update(&mut self, transition: &Transition<E::State>) -> f64 {
        let TdConfig { alpha, gamma, .. } = self.config.base;
        let Transition {
            state,
            reward,
            next_state,
        } = transition;
        let delta =
            reward.value() + gamma * self.values.value(next_state) - self.values.value(state);

        self.traces.advance(state.clone(), gamma * self.config.lambda);
        for (traced, trace) in self.traces.iter() {
            let value = self.values.value(traced);
            self.values.update(traced.clone(), value + alpha * delta * trace);
        }
        self.traces.prune();

        delta
    }

    /// Forget all traces
    pub fn reset_traces(&mut self) {
        self.traces.clear();
    }

    /// Epsilon-greedy action by one-step lookahead; `None` in terminal states
    pub fn select_action(&mut self, state: &E::State) -> Option<E::Action> {
        lookahead_action(
            &self.selector,
            &self.env,
            &self.values,
            state,
            self.config.base.gamma,
            &mut self.rng,
        )
    }

    /// Run one episode from fresh traces
    pub fn run_episode(&mut self) -> Result<EpisodeStats> {
        self.reset_traces();
        self.selector
            .set_epsilon(self.config.base.exploration.value(self.episodes_trained));

        let mut state = self.env.reset()?;
        let mut stats = EpisodeStats {
            total_reward: 0.0,
            steps: 0,
            truncated: true,
        };

        for _ in 0..self.config.base.max_steps {
            let Some(action) = self.select_action(&state) else {
                stats.truncated = false;
                break;
            };

            let step = self.env.step(&action)?;
            let transition = Transition::new(state, step.reward, step.next_state);
            self.update(&transition);
            stats.total_reward += transition.reward.value();
            stats.steps += 1;

            if step.done {
                stats.truncated = false;
                break;
            }
            state = transition.next_state;
        }

        self.episodes_trained += 1;
        Ok(stats)
    }

    /// Greedy policy by one-step lookahead over the current values
    pub fn extract_policy(&self) -> TabularPolicy<E::State, E::Action> {
        self.values.extract_policy(&self.env, self.config.base.gamma)
    }

    /// Train for `num_episodes` episodes, then extract the greedy policy
    pub fn train(
        &mut self,
        num_episodes: usize,
        verbose: bool,
    ) -> Result<TrainingSummary<E::State, E::Action>> {
        let log_interval = self.config.base.log_interval;
        let mut stats = Vec::with_capacity(num_episodes);
        let mut rewards = Vec::with_capacity(num_episodes);

        for episode_num in 1..=num_episodes {
            let episode = self.run_episode()?;
            if episode.truncated {
                debug!(episode = episode_num, "episode truncated at step cap");
            }
            rewards.push(episode.total_reward);
            stats.push(episode);

            if verbose && episode_num % log_interval == 0 {
                info!(
                    episode = episode_num,
                    total = num_episodes,
                    lambda = self.config.lambda,
                    avg_reward = trailing_mean(&rewards, log_interval),
                    "td(lambda) progress"
                );
            }
        }

        self.policy = self.extract_policy();
        Ok(TrainingSummary::new(self.policy.clone(), &stats))
    }

    /// Learned state values
    pub fn value_function(&self) -> &TabularValueFunction<E::State> {
        &self.values
    }

    /// Mutable access to the state values, e.g. to seed them
    pub fn value_function_mut(&mut self) -> &mut TabularValueFunction<E::State> {
        &mut self.values
    }

    /// Live eligibility traces
    pub fn traces(&self) -> &ReplacingTraces<E::State> {
        &self.traces
    }

    /// Policy extracted by the last `train` call
    pub fn policy(&self) -> &TabularPolicy<E::State, E::Action> {
        &self.policy
    }

    /// Trace decay λ
    pub fn lambda(&self) -> f64 {
        self.config.lambda
    }

    /// Environment being sampled
    pub fn env(&self) -> &E {
        &self.env
    }
}
