//! Schedules, running statistics and training reports shared by the solvers

use serde::{Deserialize, Serialize};
use tabular_rl_core::config::{ensure_in_range, ensure_nonzero};
use tabular_rl_core::{Result, TabularPolicy};

/// Trait for schedules (e.g., for epsilon decay)
pub trait Schedule {
    /// Get value at step t
    fn value(&self, t: usize) -> f64;
}

/// Linear schedule that decays from start to end over steps
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSchedule {
    /// Starting value
    pub start: f64,
    /// Ending value
    pub end: f64,
    /// Number of steps for decay
    pub steps: usize,
}

impl LinearSchedule {
    /// Create a new linear schedule
    #[must_use]
    pub fn new(start: f64, end: f64, steps: usize) -> Self {
        Self { start, end, steps }
    }
}

impl Schedule for LinearSchedule {
    #[allow(clippy::cast_precision_loss)]
    fn value(&self, t: usize) -> f64 {
        if t >= self.steps {
            self.end
        } else {
            let progress = t as f64 / self.steps as f64;
            self.start + (self.end - self.start) * progress
        }
    }
}

/// Exponential decay schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialSchedule {
    /// Starting value
    pub start: f64,
    /// Minimum value
    pub min_value: f64,
    /// Decay rate
    pub decay_rate: f64,
}

impl ExponentialSchedule {
    /// Create a new exponential schedule
    #[must_use]
    pub fn new(start: f64, min_value: f64, decay_rate: f64) -> Self {
        Self {
            start,
            min_value,
            decay_rate,
        }
    }
}

impl Schedule for ExponentialSchedule {
    #[allow(clippy::cast_precision_loss)]
    fn value(&self, t: usize) -> f64 {
        let value = self.start * self.decay_rate.powf(t as f64);
        value.max(self.min_value)
    }
}

/// Constant schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantSchedule {
    /// Constant value
    pub value: f64,
}

impl Schedule for ConstantSchedule {
    fn value(&self, _t: usize) -> f64 {
        self.value
    }
}

/// Epsilon schedule indexed by episode number, as it appears in configs
///
/// ```json
/// { "kind": "linear", "start": 1.0, "end": 0.05, "episodes": 500 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExplorationSchedule {
    /// Fixed epsilon
    Constant {
        /// Exploration rate
        epsilon: f64,
    },
    /// Linear decay from `start` to `end` over `episodes`
    Linear {
        /// Initial rate
        start: f64,
        /// Final rate
        end: f64,
        /// Episodes until `end` is reached
        episodes: usize,
    },
    /// `start · decay^episode`, floored at `min`
    Exponential {
        /// Initial rate
        start: f64,
        /// Floor
        min: f64,
        /// Per-episode multiplier
        decay: f64,
    },
}

impl ExplorationSchedule {
    /// Check that every rate lies in `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Constant { epsilon } => ensure_in_range("epsilon", epsilon, 0.0, 1.0),
            Self::Linear {
                start,
                end,
                episodes,
            } => {
                ensure_in_range("epsilon start", start, 0.0, 1.0)?;
                ensure_in_range("epsilon end", end, 0.0, 1.0)?;
                ensure_nonzero("epsilon decay episodes", episodes)
            }
            Self::Exponential { start, min, decay } => {
                ensure_in_range("epsilon start", start, 0.0, 1.0)?;
                ensure_in_range("epsilon min", min, 0.0, 1.0)?;
                ensure_in_range("epsilon decay", decay, 0.0, 1.0)
            }
        }
    }
}

impl Default for ExplorationSchedule {
    fn default() -> Self {
        Self::Constant { epsilon: 0.1 }
    }
}

impl Schedule for ExplorationSchedule {
    fn value(&self, t: usize) -> f64 {
        match *self {
            Self::Constant { epsilon } => ConstantSchedule { value: epsilon }.value(t),
            Self::Linear {
                start,
                end,
                episodes,
            } => LinearSchedule::new(start, end, episodes).value(t),
            Self::Exponential { start, min, decay } => {
                ExponentialSchedule::new(start, min, decay).value(t)
            }
        }
    }
}

/// Incremental arithmetic mean
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    /// Mean
    pub mean: f64,
    /// Count
    pub count: usize,
}

impl RunningMean {
    /// Create an empty mean
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a new value and return the updated mean
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&mut self, x: f64) -> f64 {
        self.count += 1;
        self.mean += (x - self.mean) / self.count as f64;
        self.mean
    }
}

/// Trailing moving average; entry `i` averages `values[i + 1 - window ..= i]`
///
/// The first `window - 1` entries average over what is available.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut sum = 0.0;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            sum += v;
            if i >= window {
                sum -= values[i - window];
            }
            sum / (i + 1).min(window) as f64
        })
        .collect()
}

/// Outcome of a model-based solver run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveReport {
    /// Iterations performed; equals the cap when `converged` is false
    pub iterations: usize,
    /// Whether the stopping criterion was met before the cap
    pub converged: bool,
}

/// Per-episode statistics from a sample-based learner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// Undiscounted sum of rewards
    pub total_reward: f64,
    /// Number of steps taken
    pub steps: usize,
    /// Whether the step cap cut the episode off
    pub truncated: bool,
}

/// Result of `train` on a sample-based learner
#[derive(Debug, Clone)]
pub struct TrainingSummary<S, A> {
    /// Policy extracted at the end of training
    pub policy: TabularPolicy<S, A>,
    /// Total reward of every episode, in order
    pub episode_rewards: Vec<f64>,
    /// Length of every episode, in order
    pub episode_lengths: Vec<usize>,
    /// Episodes cut off by the step cap
    pub truncated_episodes: usize,
}

impl<S, A> TrainingSummary<S, A> {
    pub(crate) fn new(policy: TabularPolicy<S, A>, stats: &[EpisodeStats]) -> Self {
        Self {
            policy,
            episode_rewards: stats.iter().map(|s| s.total_reward).collect(),
            episode_lengths: stats.iter().map(|s| s.steps).collect(),
            truncated_episodes: stats.iter().filter(|s| s.truncated).count(),
        }
    }

    /// Mean reward of the last `window` episodes
    #[must_use]
    pub fn recent_average(&self, window: usize) -> f64 {
        trailing_mean(&self.episode_rewards, window)
    }
}

/// Mean reward over the trailing `window` entries of `rewards`
#[allow(clippy::cast_precision_loss)]
pub(crate) fn trailing_mean(rewards: &[f64], window: usize) -> f64 {
    let n = window.min(rewards.len());
    if n == 0 {
        0.0
    } else {
        rewards[rewards.len() - n..].iter().sum::<f64>() / n as f64
    }
}
