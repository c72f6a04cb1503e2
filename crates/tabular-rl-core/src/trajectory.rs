//! Episodes and single transitions

use serde::{Deserialize, Serialize};

use crate::{Reward, Terminal};

/// Single transition `(X, R, Y)` consumed by temporal-difference updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition<S> {
    /// State the transition started from
    pub state: S,
    /// Reward received
    pub reward: Reward,
    /// State reached
    pub next_state: S,
}

impl<S> Transition<S> {
    /// Create a transition from `state` to `next_state`
    pub fn new(state: S, reward: impl Into<Reward>, next_state: S) -> Self {
        Self {
            state,
            reward: reward.into(),
            next_state,
        }
    }
}

/// One `(state, action, reward)` entry of an episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStep<S, A> {
    /// State the action was taken in
    pub state: S,
    /// Action taken
    pub action: A,
    /// Reward received for the transition
    pub reward: Reward,
}

/// Complete trajectory of an episode
///
/// `termination` records whether the episode reached a terminal state
/// (`Terminal::Yes`) or was cut off by a step cap (`Terminal::Truncated`).
/// An empty episode that started in a terminal state is `Terminal::Yes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode<S, A> {
    /// Sequence of steps
    pub steps: Vec<EpisodeStep<S, A>>,
    /// Total (undiscounted) reward
    pub total_reward: f64,
    /// How the episode ended
    pub termination: Terminal,
}

impl<S, A> Episode<S, A> {
    /// Create a new empty episode
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            total_reward: 0.0,
            termination: Terminal::No,
        }
    }

    /// Add a step to the episode
    pub fn push(&mut self, state: S, action: A, reward: Reward) {
        self.total_reward += reward.0;
        self.steps.push(EpisodeStep {
            state,
            action,
            reward,
        });
    }

    /// Mark how the episode ended
    pub fn finish(&mut self, termination: Terminal) {
        self.termination = termination;
    }

    /// Get the length of the episode
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if episode is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the episode was cut off by a step cap
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.termination.is_truncated()
    }

    /// Rewards in step order
    #[must_use]
    pub fn rewards(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.reward.0).collect()
    }

    /// Discounted return `G_t` for every step, computed backwards from `G_T = 0`
    #[must_use]
    pub fn returns(&self, gamma: f64) -> Vec<f64> {
        discounted_returns(&self.rewards(), gamma)
    }
}

impl<S, A> Default for Episode<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute returns `G_t = R_{t+1} + γ·G_{t+1}` in a single backward pass
#[must_use]
pub fn discounted_returns(rewards: &[f64], gamma: f64) -> Vec<f64> {
    let mut returns = vec![0.0; rewards.len()];
    let mut running_return = 0.0;

    for i in (0..rewards.len()).rev() {
        running_return = rewards[i] + gamma * running_return;
        returns[i] = running_return;
    }

    returns
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn returns_for_delayed_reward() {
        let returns = discounted_returns(&[0.0, 0.0, 1.0], 0.9);
        assert_eq!(returns.len(), 3);
        assert_abs_diff_eq!(returns[0], 0.81, epsilon = 1e-12);
        assert_abs_diff_eq!(returns[1], 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(returns[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_rewards_give_no_returns() {
        assert!(discounted_returns(&[], 0.9).is_empty());
    }

    #[test]
    fn episode_tracks_total_and_termination() {
        let mut episode = Episode::new();
        episode.push("a", 0_u8, Reward(0.0));
        episode.push("b", 1_u8, Reward(1.0));
        episode.finish(Terminal::Truncated);

        assert_eq!(episode.len(), 2);
        assert_eq!(episode.total_reward, 1.0);
        assert!(episode.is_truncated());
        assert_eq!(episode.rewards(), vec![0.0, 1.0]);
        assert_abs_diff_eq!(episode.returns(0.5)[0], 0.5);
    }
}
