//! Environment traits and types
//!
//! The model-based solvers only need [`Mdp`]: the state set, legal actions,
//! transition probabilities and rewards. Sample-based learners additionally
//! drive an [`Environment`] through `reset`/`step`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Action, RLError, Reward, State};

/// Tolerance used by [`validate_model`] for probability sums
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Result of a single environment step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step<S> {
    /// State reached by the transition
    pub next_state: S,
    /// Reward signal
    pub reward: Reward,
    /// Whether the episode is done
    pub done: bool,
}

impl<S> Step<S> {
    /// Create a new step result
    pub fn new(next_state: S, reward: impl Into<Reward>, done: bool) -> Self {
        Self {
            next_state,
            reward: reward.into(),
            done,
        }
    }
}

/// Full model of a finite Markov Decision Process
pub trait Mdp {
    /// State type
    type State: State;
    /// Action type
    type Action: Action;

    /// All reachable states, in a fixed order
    fn states(&self) -> Vec<Self::State>;

    /// Legal actions in `state`, in a fixed order; empty means terminal
    fn actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Successor distribution `(next_state, probability)` for `(state, action)`
    fn transitions(&self, state: &Self::State, action: &Self::Action) -> Vec<(Self::State, f64)>;

    /// Deterministic reward for the transition `state --action--> next_state`
    fn reward(&self, state: &Self::State, action: &Self::Action, next_state: &Self::State) -> f64;

    /// Discount factor of the task
    fn discount_factor(&self) -> f64 {
        1.0
    }

    /// Check if `state` is absorbing
    fn is_terminal(&self, state: &Self::State) -> bool {
        self.actions(state).is_empty()
    }
}

/// Episodic sampling interface on top of an [`Mdp`]
pub trait Environment: Mdp {
    /// Reset the environment and return the starting state
    fn reset(&mut self) -> crate::Result<Self::State>;

    /// Take a step from the current internal state
    fn step(&mut self, action: &Self::Action) -> crate::Result<Step<Self::State>>;
}

impl<M: Mdp + ?Sized> Mdp for &M {
    type State = M::State;
    type Action = M::Action;

    fn states(&self) -> Vec<Self::State> {
        (**self).states()
    }

    fn actions(&self, state: &Self::State) -> Vec<Self::Action> {
        (**self).actions(state)
    }

    fn transitions(&self, state: &Self::State, action: &Self::Action) -> Vec<(Self::State, f64)> {
        (**self).transitions(state, action)
    }

    fn reward(&self, state: &Self::State, action: &Self::Action, next_state: &Self::State) -> f64 {
        (**self).reward(state, action, next_state)
    }

    fn discount_factor(&self) -> f64 {
        (**self).discount_factor()
    }

    fn is_terminal(&self, state: &Self::State) -> bool {
        (**self).is_terminal(state)
    }
}

impl<M: Mdp + ?Sized> Mdp for &mut M {
    type State = M::State;
    type Action = M::Action;

    fn states(&self) -> Vec<Self::State> {
        (**self).states()
    }

    fn actions(&self, state: &Self::State) -> Vec<Self::Action> {
        (**self).actions(state)
    }

    fn transitions(&self, state: &Self::State, action: &Self::Action) -> Vec<(Self::State, f64)> {
        (**self).transitions(state, action)
    }

    fn reward(&self, state: &Self::State, action: &Self::Action, next_state: &Self::State) -> f64 {
        (**self).reward(state, action, next_state)
    }

    fn discount_factor(&self) -> f64 {
        (**self).discount_factor()
    }

    fn is_terminal(&self, state: &Self::State) -> bool {
        (**self).is_terminal(state)
    }
}

impl<E: Environment + ?Sized> Environment for &mut E {
    fn reset(&mut self) -> crate::Result<Self::State> {
        (**self).reset()
    }

    fn step(&mut self, action: &Self::Action) -> crate::Result<Step<Self::State>> {
        (**self).step(action)
    }
}

/// Check that every legal `(state, action)` has a proper successor distribution
///
/// Solvers trust the model; call this once up front when the model comes
/// from an untrusted source.
pub fn validate_model<M: Mdp + ?Sized>(mdp: &M) -> crate::Result<()> {
    let gamma = mdp.discount_factor();
    if !(0.0..=1.0).contains(&gamma) {
        return Err(RLError::InvalidModel(format!(
            "discount factor must be in [0, 1], got {gamma}"
        )));
    }

    let states = mdp.states();
    let mut pairs = 0_usize;
    for state in &states {
        for action in mdp.actions(state) {
            pairs += 1;
            let successors = mdp.transitions(state, &action);
            if successors.is_empty() {
                return Err(RLError::InvalidModel(format!(
                    "action {action:?} in state {state:?} has no successors"
                )));
            }

            let mut total = 0.0;
            for (next_state, p) in &successors {
                if !p.is_finite() || *p < 0.0 {
                    return Err(RLError::InvalidModel(format!(
                        "transition {state:?} --{action:?}--> {next_state:?} has probability {p}"
                    )));
                }
                total += p;
            }

            if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
                return Err(RLError::InvalidModel(format!(
                    "probabilities for {action:?} in state {state:?} sum to {total}"
                )));
            }
        }
    }

    debug!(states = states.len(), pairs, "transition model validated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two states; action 0 in state 0 splits its mass by `p`.
    struct Coin {
        p: f64,
    }

    impl Mdp for Coin {
        type State = u8;
        type Action = u8;

        fn states(&self) -> Vec<u8> {
            vec![0, 1]
        }

        fn actions(&self, state: &u8) -> Vec<u8> {
            if *state == 0 {
                vec![0]
            } else {
                Vec::new()
            }
        }

        fn transitions(&self, _state: &u8, _action: &u8) -> Vec<(u8, f64)> {
            vec![(0, self.p), (1, 0.5)]
        }

        fn reward(&self, _state: &u8, _action: &u8, next_state: &u8) -> f64 {
            f64::from(*next_state)
        }
    }

    #[test]
    fn accepts_proper_distributions() {
        assert!(validate_model(&Coin { p: 0.5 }).is_ok());
    }

    #[test]
    fn rejects_bad_probability_sums() {
        let err = validate_model(&Coin { p: 0.2 }).unwrap_err();
        assert!(matches!(err, RLError::InvalidModel(_)));
    }

    #[test]
    fn rejects_negative_probabilities() {
        let err = validate_model(&Coin { p: -0.5 }).unwrap_err();
        assert!(matches!(err, RLError::InvalidModel(_)));
    }

    #[test]
    fn terminal_defaults_to_no_actions() {
        let coin = Coin { p: 0.5 };
        assert!(!coin.is_terminal(&0));
        assert!(coin.is_terminal(&1));
        assert_eq!((&coin).discount_factor(), 1.0);
    }
}
