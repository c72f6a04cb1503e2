//! One-step temporal-difference prediction, TD(0)
//!
//! Only V is learned. Actions are chosen epsilon-greedily, scoring each
//! candidate by one-step lookahead through the environment's model.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tabular_rl_core::config::{ensure_in_range, ensure_nonzero, ensure_positive};
use tabular_rl_core::{
    Environment, EpsilonGreedy, Mdp, Result, TabularPolicy, TabularValueFunction, Transition,
};

use crate::utils::{
    trailing_mean, EpisodeStats, ExplorationSchedule, Schedule, TrainingSummary,
};

/// TD(0) configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TdConfig {
    /// Step size α in `(0, 1]`
    pub alpha: f64,
    /// Epsilon by episode number
    pub exploration: ExplorationSchedule,
    /// Discount factor
    pub gamma: f64,
    /// Step cap per episode
    pub max_steps: usize,
    /// Episodes between progress reports when training verbosely
    pub log_interval: usize,
    /// Seed for the exploration generator; entropy when absent
    pub seed: Option<u64>,
}

impl Default for TdConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            exploration: ExplorationSchedule::default(),
            gamma: 0.9,
            max_steps: 1000,
            log_interval: 100,
            seed: None,
        }
    }
}

impl TdConfig {
    /// Validate hyper-parameters
    pub fn validate(&self) -> Result<()> {
        ensure_positive("alpha", self.alpha)?;
        ensure_in_range("alpha", self.alpha, 0.0, 1.0)?;
        self.exploration.validate()?;
        ensure_in_range("gamma", self.gamma, 0.0, 1.0)?;
        ensure_nonzero("max_steps", self.max_steps)?;
        ensure_nonzero("log_interval", self.log_interval)
    }

    pub(crate) fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Epsilon-greedy choice whose greedy branch maximises `Σ P·(R + γ·V(s'))`
pub(crate) fn lookahead_action<M, R>(
    selector: &EpsilonGreedy,
    mdp: &M,
    values: &TabularValueFunction<M::State>,
    state: &M::State,
    gamma: f64,
    rng: &mut R,
) -> Option<M::Action>
where
    M: Mdp + ?Sized,
    R: Rng + ?Sized,
{
    let actions = mdp.actions(state);
    selector.select(&actions, rng, |_| {
        values
            .greedy_action(mdp, state, gamma)
            .map(|(action, _)| action)
    })
}

/// TD(0) learner
pub struct TdZero<E: Environment, R: Rng = StdRng> {
    env: E,
    config: TdConfig,
    values: TabularValueFunction<E::State>,
    policy: TabularPolicy<E::State, E::Action>,
    selector: EpsilonGreedy,
    rng: R,
    episodes_trained: usize,
}

impl<E: Environment> TdZero<E> {
    /// Create a learner whose generator is seeded from `config.seed`
    pub fn new(env: E, config: TdConfig) -> Result<Self> {
        let rng = config.rng();
        Self::with_rng(env, config, rng)
    }
}

impl<E: Environment, R: Rng> TdZero<E, R> {
    /// Create a learner drawing exploration randomness from `rng`
    pub fn with_rng(env: E, config: TdConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let selector = EpsilonGreedy::new(config.exploration.value(0));
        Ok(Self {
            env,
            config,
            values: TabularValueFunction::new(0.0),
            policy: TabularPolicy::new(None),
            selector,
            rng,
            episodes_trained: 0,
        })
    }

    /// `δ = R + γ·V(Y) − V(X)`, `V(X) ← V(X) + α·δ`; returns δ
    pub fn update(&mut self, transition: &Transition<E::State>) -> f64 {
        let Transition {
            state,
            reward,
            next_state,
        } = transition;
        let current = self.values.value(state);
        let delta = reward.value() + self.config.gamma * self.values.value(next_state) - current;
        self.values
            .update(state.clone(), current + self.config.alpha * delta);
        delta
    }

    /// Epsilon-greedy action by one-step lookahead; `None` in terminal states
    pub fn select_action(&mut self, state: &E::State) -> Option<E::Action> {
        lookahead_action(
            &self.selector,
            &self.env,
            &self.values,
            state,
            self.config.gamma,
            &mut self.rng,
        )
    }

    /// Run one episode, updating V after every transition
    pub fn run_episode(&mut self) -> Result<EpisodeStats> {
        self.selector
            .set_epsilon(self.config.exploration.value(self.episodes_trained));

        let mut state = self.env.reset()?;
        let mut stats = EpisodeStats {
            total_reward: 0.0,
            steps: 0,
            truncated: true,
        };

        for _ in 0..self.config.max_steps {
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
        self.values.extract_policy(&self.env, self.config.gamma)
    }

    /// Train for `num_episodes` episodes, then extract the greedy policy
    pub fn train(
        &mut self,
        num_episodes: usize,
        verbose: bool,
    ) -> Result<TrainingSummary<E::State, E::Action>> {
        let mut stats = Vec::with_capacity(num_episodes);
        let mut rewards = Vec::with_capacity(num_episodes);

        for episode_num in 1..=num_episodes {
            let episode = self.run_episode()?;
            if episode.truncated {
                debug!(episode = episode_num, "episode truncated at step cap");
            }
            rewards.push(episode.total_reward);
            stats.push(episode);

            if verbose && episode_num % self.config.log_interval == 0 {
                info!(
                    episode = episode_num,
                    total = num_episodes,
                    avg_reward = trailing_mean(&rewards, self.config.log_interval),
                    "td(0) progress"
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

    /// Policy extracted by the last `train` call
    pub fn policy(&self) -> &TabularPolicy<E::State, E::Action> {
        &self.policy
    }

    /// Environment being sampled
    pub fn env(&self) -> &E {
        &self.env
    }
}
