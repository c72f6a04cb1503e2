//! Policy abstractions for action selection

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::{Action, Mdp, State};

/// Core policy trait for selecting actions
pub trait Policy<S, A> {
    /// Select an action for `state`; `None` means "no action"
    fn act(&self, state: &S) -> Option<A>;
}

/// Deterministic tabular policy
///
/// States that were never assigned fall back to `default_action`.
#[derive(Debug, Clone)]
pub struct TabularPolicy<S, A> {
    /// Assigned actions
    actions: HashMap<S, A>,
    /// Action for unassigned states
    default_action: Option<A>,
}

impl<S: State, A: Action> TabularPolicy<S, A> {
    /// Create an empty policy with the given fallback action
    #[must_use]
    pub fn new(default_action: Option<A>) -> Self {
        Self {
            actions: HashMap::new(),
            default_action,
        }
    }

    /// Assign a uniformly random legal action to every non-terminal state
    pub fn random<M, R>(mdp: &M, rng: &mut R) -> Self
    where
        M: Mdp<State = S, Action = A> + ?Sized,
        R: Rng + ?Sized,
    {
        let mut policy = Self::new(None);
        for state in mdp.states() {
            if let Some(action) = mdp.actions(&state).choose(rng) {
                policy.update(state, action.clone());
            }
        }
        policy
    }

    /// Action for `state`, or the default action
    #[must_use]
    pub fn action(&self, state: &S) -> Option<A> {
        self.actions
            .get(state)
            .or(self.default_action.as_ref())
            .cloned()
    }

    /// Assign `action` to `state`, returning the previous assignment
    pub fn update(&mut self, state: S, action: A) -> Option<A> {
        self.actions.insert(state, action)
    }

    /// Fallback action for unassigned states
    #[must_use]
    pub fn default_action(&self) -> Option<&A> {
        self.default_action.as_ref()
    }

    /// Number of assigned states
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if no state has been assigned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate over assignments in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&S, &A)> {
        self.actions.iter()
    }
}

impl<S: State, A: Action> Policy<S, A> for TabularPolicy<S, A> {
    fn act(&self, state: &S) -> Option<A> {
        self.action(state)
    }
}

impl<S: State, A: Action> PartialEq for TabularPolicy<S, A> {
    fn eq(&self, other: &Self) -> bool {
        self.actions == other.actions && self.default_action == other.default_action
    }
}

impl<S: State, A: Action> Eq for TabularPolicy<S, A> {}

impl<S: State, A: Action> Default for TabularPolicy<S, A> {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Epsilon-greedy action selection
///
/// Exactly one uniform draw is taken per non-empty selection, whether or not
/// it explores, so the random stream only depends on the number of
/// decisions made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonGreedy {
    /// Exploration rate
    epsilon: f64,
}

impl EpsilonGreedy {
    /// Create a new epsilon-greedy selector
    #[must_use]
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.clamp(0.0, 1.0),
        }
    }

    /// Current exploration rate
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Set the exploration rate
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    /// With probability ε pick uniformly among `actions`, otherwise defer to `greedy`
    pub fn select<A, R, F>(&self, actions: &[A], rng: &mut R, greedy: F) -> Option<A>
    where
        A: Clone,
        R: Rng + ?Sized,
        F: FnOnce(&[A]) -> Option<A>,
    {
        if actions.is_empty() {
            return None;
        }

        if rng.gen::<f64>() < self.epsilon {
            // Explore: random action
            actions.choose(rng).cloned()
        } else {
            // Exploit: best-known action
            greedy(actions).or_else(|| actions.choose(rng).cloned())
        }
    }
}
