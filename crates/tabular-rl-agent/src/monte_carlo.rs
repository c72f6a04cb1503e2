//! On-policy Monte Carlo control with epsilon-greedy exploration
//!
//! Each episode is sampled under an epsilon-greedy policy over the current
//! Q-table, returns are computed backwards, and Q(s, a) is set to the mean
//! of every return observed for the pair. The greedy policy is re-derived
//! after every episode.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tabular_rl_core::config::{ensure_in_range, ensure_nonzero};
use tabular_rl_core::{
    Environment, Episode, EpsilonGreedy, QTable, Result, TabularPolicy, TabularValueFunction,
    Terminal,
};

use crate::utils::{
    trailing_mean, EpisodeStats, ExplorationSchedule, RunningMean, Schedule, TrainingSummary,
};

/// Which occurrences of a state-action pair contribute a return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitMode {
    /// Only the first occurrence in each episode
    #[default]
    FirstVisit,
    /// Every occurrence
    EveryVisit,
}

/// Monte Carlo control configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// Epsilon by episode number
    pub exploration: ExplorationSchedule,
    /// Discount factor for returns
    pub gamma: f64,
    /// First-visit or every-visit averaging
    pub visit: VisitMode,
    /// Step cap per episode
    pub max_steps: usize,
    /// Skip the Q update for episodes cut off by `max_steps`
    pub exclude_truncated: bool,
    /// Episodes between progress reports when training verbosely
    pub log_interval: usize,
    /// Seed for the exploration generator; entropy when absent
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            exploration: ExplorationSchedule::default(),
            gamma: 0.9,
            visit: VisitMode::FirstVisit,
            max_steps: 1000,
            exclude_truncated: false,
            log_interval: 100,
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    /// Validate hyper-parameters
    pub fn validate(&self) -> Result<()> {
        self.exploration.validate()?;
        ensure_in_range("gamma", self.gamma, 0.0, 1.0)?;
        ensure_nonzero("max_steps", self.max_steps)?;
        ensure_nonzero("log_interval", self.log_interval)
    }
}

/// Monte Carlo control agent
///
/// An episode that hits `max_steps` is cut off and, unless
/// `exclude_truncated` is set, its partial returns are averaged in as if
/// the episode had ended there. Those returns miss every reward after the
/// cap, so they are biased towards zero for environments that pay late.
pub struct MonteCarloControl<E: Environment, R: Rng = StdRng> {
    env: E,
    config: MonteCarloConfig,
    q_table: QTable<E::State, E::Action>,
    returns: HashMap<(E::State, E::Action), RunningMean>,
    policy: TabularPolicy<E::State, E::Action>,
    selector: EpsilonGreedy,
    rng: R,
    episodes_trained: usize,
}

impl<E: Environment> MonteCarloControl<E> {
    /// Create an agent whose generator is seeded from `config.seed`
    pub fn new(env: E, config: MonteCarloConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(env, config, rng)
    }
}

impl<E: Environment, R: Rng> MonteCarloControl<E, R> {
    /// Create an agent drawing exploration randomness from `rng`
    pub fn with_rng(env: E, config: MonteCarloConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let selector = EpsilonGreedy::new(config.exploration.value(0));
        Ok(Self {
            env,
            config,
            q_table: QTable::new(1.0, 0.0),
            returns: HashMap::new(),
            policy: TabularPolicy::new(None),
            selector,
            rng,
            episodes_trained: 0,
        })
    }

    /// Epsilon-greedy action over the Q-table; `None` when `actions` is empty
    pub fn select_action(&mut self, state: &E::State, actions: &[E::Action]) -> Option<E::Action> {
        let q_table = &self.q_table;
        self.selector
            .select(actions, &mut self.rng, |acts| q_table.best_action(state, acts))
    }

    /// Sample one episode under the current epsilon-greedy policy
    pub fn generate_episode(&mut self) -> Result<Episode<E::State, E::Action>> {
        let mut episode = Episode::new();
        let mut state = self.env.reset()?;

        for _ in 0..self.config.max_steps {
            let actions = self.env.actions(&state);
            let Some(action) = self.select_action(&state, &actions) else {
                episode.finish(Terminal::Yes);
                return Ok(episode);
            };

            let step = self.env.step(&action)?;
            episode.push(state, action, step.reward);

            if step.done {
                episode.finish(Terminal::Yes);
                return Ok(episode);
            }
            state = step.next_state;
        }

        episode.finish(Terminal::Truncated);
        Ok(episode)
    }

    /// Fold an episode's returns into the per-pair averages
    pub fn update_q_values(&mut self, episode: &Episode<E::State, E::Action>) {
        if episode.is_truncated() && self.config.exclude_truncated {
            debug!(steps = episode.len(), "skipping truncated episode");
            return;
        }

        let returns = episode.returns(self.config.gamma);
        let mut visited = HashSet::new();

        for (step, g) in episode.steps.iter().zip(returns) {
            let pair = (step.state.clone(), step.action.clone());
            if self.config.visit == VisitMode::FirstVisit && !visited.insert(pair.clone()) {
                continue;
            }

            let mean = self.returns.entry(pair).or_default().update(g);
            self.q_table
                .update(step.state.clone(), step.action.clone(), mean);
        }
    }

    /// Make the policy greedy in Q for every non-terminal state
    pub fn improve_policy(&mut self) {
        for state in self.env.states() {
            let actions = self.env.actions(&state);
            if let Some(action) = self.q_table.best_action(&state, &actions) {
                self.policy.update(state, action);
            }
        }
    }

    /// Sample, evaluate and improve for one episode
    pub fn run_episode(&mut self) -> Result<EpisodeStats> {
        self.selector
            .set_epsilon(self.config.exploration.value(self.episodes_trained));

        let episode = self.generate_episode()?;
        self.update_q_values(&episode);
        self.improve_policy();
        self.episodes_trained += 1;

        Ok(EpisodeStats {
            total_reward: episode.total_reward,
            steps: episode.len(),
            truncated: episode.is_truncated(),
        })
    }

    /// Train for `num_episodes` episodes
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
                    epsilon = self.selector.epsilon(),
                    avg_reward = trailing_mean(&rewards, self.config.log_interval),
                    "monte carlo progress"
                );
            }
        }

        let summary = TrainingSummary::new(self.policy.clone(), &stats);
        if summary.truncated_episodes > 0 {
            info!(
                truncated = summary.truncated_episodes,
                "episodes cut off by max_steps"
            );
        }
        Ok(summary)
    }

    /// `V(s) = max_a Q(s, a)`, with terminal states at 0
    pub fn value_function(&self) -> TabularValueFunction<E::State> {
        let mut values = TabularValueFunction::new(0.0);
        for state in self.env.states() {
            let actions = self.env.actions(&state);
            let value = if actions.is_empty() {
                0.0
            } else {
                self.q_table.max_q(&state, &actions)
            };
            values.update(state, value);
        }
        values
    }

    /// Learned action values
    pub fn q_table(&self) -> &QTable<E::State, E::Action> {
        &self.q_table
    }

    /// Current greedy policy
    pub fn policy(&self) -> &TabularPolicy<E::State, E::Action> {
        &self.policy
    }

    /// Number of returns averaged into `Q(state, action)`
    pub fn visit_count(&self, state: &E::State, action: &E::Action) -> usize {
        self.returns
            .get(&(state.clone(), action.clone()))
            .map_or(0, |mean| mean.count)
    }

    /// Episodes trained so far
    pub fn episodes_trained(&self) -> usize {
        self.episodes_trained
    }

    /// Environment being sampled
    pub fn env(&self) -> &E {
        &self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tabular_rl_core::{Mdp, RLError, Step};
    use tabular_rl_env::{Direction, GridWorld, GridWorldConfig};

    /// Scripted chain `0 → 1 → 2 → 3(terminal)`, reward 1 on reaching 3
    struct Chain {
        at: u8,
        resets: usize,
    }

    impl Chain {
        fn new() -> Self {
            Self { at: 0, resets: 0 }
        }
    }

    impl Mdp for Chain {
        type State = u8;
        type Action = ();

        fn states(&self) -> Vec<u8> {
            vec![0, 1, 2, 3]
        }

        fn actions(&self, state: &u8) -> Vec<()> {
            if *state == 3 {
                Vec::new()
            } else {
                vec![()]
            }
        }

        fn transitions(&self, state: &u8, _action: &()) -> Vec<(u8, f64)> {
            vec![(state + 1, 1.0)]
        }

        fn reward(&self, _state: &u8, _action: &(), next_state: &u8) -> f64 {
            if *next_state == 3 {
                1.0
            } else {
                0.0
            }
        }
    }

    impl Environment for Chain {
        fn reset(&mut self) -> Result<u8> {
            self.at = 0;
            self.resets += 1;
            Ok(0)
        }

        fn step(&mut self, _action: &()) -> Result<Step<u8>> {
            if self.at == 3 {
                return Err(RLError::InvalidAction("stepped past the end".into()));
            }
            self.at += 1;
            Ok(Step::new(self.at, if self.at == 3 { 1.0 } else { 0.0 }, self.at == 3))
        }
    }

    fn config() -> MonteCarloConfig {
        MonteCarloConfig {
            seed: Some(7),
            ..MonteCarloConfig::default()
        }
    }

    #[test]
    fn q_values_are_discounted_returns() {
        let mut agent = MonteCarloControl::new(Chain::new(), config()).unwrap();
        let stats = agent.run_episode().unwrap();
        assert_eq!(stats.steps, 3);
        assert!(!stats.truncated);

        let q = agent.q_table();
        assert_abs_diff_eq!(q.q_value(&0, &()), 0.81, epsilon = 1e-12);
        assert_abs_diff_eq!(q.q_value(&1, &()), 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(q.q_value(&2, &()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn value_function_is_max_q_with_terminal_zero() {
        let mut agent = MonteCarloControl::new(Chain::new(), config()).unwrap();
        agent.train(3, false).unwrap();
        let values = agent.value_function();
        assert_abs_diff_eq!(values.value(&0), 0.81, epsilon = 1e-12);
        assert_eq!(values.value(&3), 0.0);
        assert!(values.contains(&3));
    }

    #[test]
    fn first_visit_counts_once_per_episode() {
        let mut agent = MonteCarloControl::new(Chain::new(), config()).unwrap();
        let mut episode = Episode::new();
        episode.push(0, (), 0.0.into());
        episode.push(0, (), 0.0.into());
        episode.push(0, (), 1.0.into());
        episode.finish(Terminal::Yes);

        agent.update_q_values(&episode);
        assert_eq!(agent.visit_count(&0, &()), 1);
        assert_abs_diff_eq!(agent.q_table().q_value(&0, &()), 0.81, epsilon = 1e-12);
    }

    #[test]
    fn every_visit_averages_all_occurrences() {
        let config = MonteCarloConfig {
            visit: VisitMode::EveryVisit,
            ..config()
        };
        let mut agent = MonteCarloControl::new(Chain::new(), config).unwrap();
        let mut episode = Episode::new();
        episode.push(0, (), 0.0.into());
        episode.push(0, (), 0.0.into());
        episode.push(0, (), 1.0.into());
        episode.finish(Terminal::Yes);

        agent.update_q_values(&episode);
        assert_eq!(agent.visit_count(&0, &()), 3);
        assert_abs_diff_eq!(
            agent.q_table().q_value(&0, &()),
            (0.81 + 0.9 + 1.0) / 3.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn q_is_the_mean_over_episodes() {
        let mut agent = MonteCarloControl::new(Chain::new(), config()).unwrap();
        for reward in [1.0, 0.0, 0.5] {
            let mut episode = Episode::new();
            episode.push(0, (), reward.into());
            episode.finish(Terminal::Yes);
            agent.update_q_values(&episode);
        }
        assert_abs_diff_eq!(agent.q_table().q_value(&0, &()), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn truncated_episodes_can_be_excluded() {
        let config = MonteCarloConfig {
            max_steps: 2,
            exclude_truncated: true,
            ..config()
        };
        let mut agent = MonteCarloControl::new(Chain::new(), config).unwrap();
        let summary = agent.train(2, false).unwrap();
        assert_eq!(summary.truncated_episodes, 2);
        assert_eq!(summary.episode_lengths, vec![2, 2]);
        assert!(agent.q_table().is_empty());
    }

    #[test]
    fn truncated_episodes_count_by_default() {
        let config = MonteCarloConfig {
            max_steps: 2,
            ..config()
        };
        let mut agent = MonteCarloControl::new(Chain::new(), config).unwrap();
        agent.run_episode().unwrap();
        assert_eq!(agent.visit_count(&0, &()), 1);
        assert_eq!(agent.q_table().q_value(&0, &()), 0.0);
    }

    #[test]
    fn environment_errors_propagate() {
        struct Broken;
        impl Mdp for Broken {
            type State = u8;
            type Action = u8;
            fn states(&self) -> Vec<u8> {
                vec![0]
            }
            fn actions(&self, _state: &u8) -> Vec<u8> {
                vec![0]
            }
            fn transitions(&self, _state: &u8, _action: &u8) -> Vec<(u8, f64)> {
                vec![(0, 1.0)]
            }
            fn reward(&self, _state: &u8, _action: &u8, _next_state: &u8) -> f64 {
                0.0
            }
        }
        impl Environment for Broken {
            fn reset(&mut self) -> Result<u8> {
                Err(RLError::Environment("offline".into()))
            }
            fn step(&mut self, _action: &u8) -> Result<Step<u8>> {
                unreachable!()
            }
        }

        let mut agent = MonteCarloControl::new(Broken, config()).unwrap();
        assert!(matches!(agent.train(1, false), Err(RLError::Environment(_))));
    }

    #[test]
    fn learns_grid_world_policy() {
        let grid = GridWorld::new(GridWorldConfig {
            seed: Some(3),
            ..GridWorldConfig::default()
        })
        .unwrap();
        let config = MonteCarloConfig {
            exploration: ExplorationSchedule::Constant { epsilon: 0.2 },
            max_steps: 200,
            ..config()
        };
        let mut agent = MonteCarloControl::new(grid, config).unwrap();
        let summary = agent.train(2000, false).unwrap();

        assert_eq!(summary.episode_rewards.len(), 2000);
        assert_eq!(summary.policy.action(&(0, 2)), Some(Direction::Right));
        assert_eq!(summary.policy.action(&(1, 3)), Some(Direction::Up));
        assert!(summary.recent_average(100) > 0.5);
    }

    #[test]
    fn same_seed_same_training() {
        let run = || {
            let grid = GridWorld::new(GridWorldConfig {
                seed: Some(11),
                ..GridWorldConfig::default()
            })
            .unwrap();
            let mut agent = MonteCarloControl::new(grid, config()).unwrap();
            agent.train(50, false).unwrap().episode_lengths
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn schedule_drives_epsilon() {
        let config = MonteCarloConfig {
            exploration: ExplorationSchedule::Linear {
                start: 1.0,
                end: 0.0,
                episodes: 4,
            },
            ..config()
        };
        let mut agent = MonteCarloControl::new(Chain::new(), config).unwrap();
        agent.train(3, false).unwrap();
        assert_eq!(agent.episodes_trained(), 3);
        assert_abs_diff_eq!(agent.selector.epsilon(), 0.5);
    }

    #[test]
    fn rejects_bad_config() {
        let config = MonteCarloConfig {
            gamma: 1.5,
            ..MonteCarloConfig::default()
        };
        assert!(matches!(
            MonteCarloControl::new(Chain::new(), config),
            Err(RLError::InvalidConfig(_))
        ));
    }
}
