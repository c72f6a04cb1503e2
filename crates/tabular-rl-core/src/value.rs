//! Value functions for tabular RL algorithms

use std::collections::HashMap;

use crate::{Mdp, State, TabularPolicy};

/// State value function V(s)
pub trait ValueFunction<S> {
    /// Estimate the value of a state
    fn value(&self, state: &S) -> f64;
}

/// Tabular value function (for discrete state spaces)
///
/// Lookups of states that were never written return `default_value`
/// without inserting anything, so `len()` only counts explicit entries.
#[derive(Debug, Clone)]
pub struct TabularValueFunction<S> {
    /// Value table
    values: HashMap<S, f64>,
    /// Default value for unseen states
    default_value: f64,
}

impl<S: State> TabularValueFunction<S> {
    /// Create a new, empty tabular value function
    #[must_use]
    pub fn new(default_value: f64) -> Self {
        Self {
            values: HashMap::new(),
            default_value,
        }
    }

    /// Create a value function pre-seeded with `entries`
    pub fn with_values(default_value: f64, entries: impl IntoIterator<Item = (S, f64)>) -> Self {
        Self {
            values: entries.into_iter().collect(),
            default_value,
        }
    }

    /// Value of `state`, or the default when it was never set
    #[must_use]
    pub fn value(&self, state: &S) -> f64 {
        self.values.get(state).copied().unwrap_or(self.default_value)
    }

    /// Overwrite the value of `state`
    pub fn update(&mut self, state: S, value: f64) {
        self.values.insert(state, value);
    }

    /// Copy every explicit entry of `other` into this table
    pub fn merge(&mut self, other: &Self) {
        for (state, value) in &other.values {
            self.values.insert(state.clone(), *value);
        }
    }

    /// Value returned for unseen states
    #[must_use]
    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    /// Whether `state` has an explicit entry
    #[must_use]
    pub fn contains(&self, state: &S) -> bool {
        self.values.contains_key(state)
    }

    /// Number of explicit entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no state has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over explicit entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&S, &f64)> {
        self.values.iter()
    }

    /// One-step lookahead `Σ P(s'|s,a)·(R(s,a,s') + γ·V(s'))`
    pub fn expected_return<M>(&self, mdp: &M, state: &S, action: &M::Action, gamma: f64) -> f64
    where
        M: Mdp<State = S> + ?Sized,
    {
        mdp.transitions(state, action)
            .iter()
            .map(|(next_state, p)| {
                p * (mdp.reward(state, action, next_state) + gamma * self.value(next_state))
            })
            .sum()
    }

    /// Best action in `state` by one-step lookahead, with its value
    ///
    /// Ties go to the first maximising action in the MDP's action order.
    /// Returns `None` for terminal states.
    pub fn greedy_action<M>(&self, mdp: &M, state: &S, gamma: f64) -> Option<(M::Action, f64)>
    where
        M: Mdp<State = S> + ?Sized,
    {
        let mut best: Option<(M::Action, f64)> = None;
        for action in mdp.actions(state) {
            let value = self.expected_return(mdp, state, &action, gamma);
            if best.as_ref().map_or(true, |(_, best_value)| value > *best_value) {
                best = Some((action, value));
            }
        }
        best
    }

    /// Greedy policy `π(s) = argmax_a Σ P·(R + γ·V(s'))` over every non-terminal state
    pub fn extract_policy<M>(&self, mdp: &M, gamma: f64) -> TabularPolicy<S, M::Action>
    where
        M: Mdp<State = S> + ?Sized,
    {
        let mut policy = TabularPolicy::new(None);
        for state in mdp.states() {
            if let Some((action, _)) = self.greedy_action(mdp, &state, gamma) {
                policy.update(state, action);
            }
        }
        policy
    }
}

impl<S: State> ValueFunction<S> for TabularValueFunction<S> {
    fn value(&self, state: &S) -> f64 {
        TabularValueFunction::value(self, state)
    }
}

impl<S: State> Default for TabularValueFunction<S> {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// 0 -> 1 -> 2 (absorbing); "r" moves right, "s" stays; reward 1 on entering 2.
    struct Line;

    impl Mdp for Line {
        type State = u8;
        type Action = &'static str;

        fn states(&self) -> Vec<u8> {
            vec![0, 1, 2]
        }

        fn actions(&self, state: &u8) -> Vec<&'static str> {
            if *state == 2 {
                Vec::new()
            } else {
                vec!["s", "r"]
            }
        }

        fn transitions(&self, state: &u8, action: &&'static str) -> Vec<(u8, f64)> {
            match *action {
                "r" => vec![(state + 1, 1.0)],
                _ => vec![(*state, 1.0)],
            }
        }

        fn reward(&self, _state: &u8, _action: &&'static str, next_state: &u8) -> f64 {
            if *next_state == 2 {
                1.0
            } else {
                0.0
            }
        }

        fn discount_factor(&self) -> f64 {
            0.9
        }
    }

    #[test]
    fn unseen_states_return_default_without_inserting() {
        let values = TabularValueFunction::<u8>::new(-1.0);
        assert_eq!(values.value(&42), -1.0);
        assert!(values.is_empty());
        assert!(!values.contains(&42));
    }

    #[test]
    fn merge_overwrites_entries() {
        let mut a = TabularValueFunction::with_values(0.0, [(0_u8, 1.0), (1, 2.0)]);
        let b = TabularValueFunction::with_values(0.0, [(1_u8, 5.0), (2, 3.0)]);
        a.merge(&b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.value(&0), 1.0);
        assert_eq!(a.value(&1), 5.0);
        assert_eq!(a.value(&2), 3.0);
    }

    #[test]
    fn expected_return_uses_reward_and_discounted_successor() {
        let values = TabularValueFunction::with_values(0.0, [(1_u8, 0.5)]);
        assert_abs_diff_eq!(values.expected_return(&Line, &0, &"r", 0.9), 0.45);
        assert_abs_diff_eq!(values.expected_return(&Line, &1, &"r", 0.9), 1.0);
    }

    #[test]
    fn greedy_action_breaks_ties_by_action_order() {
        let values = TabularValueFunction::new(0.0);
        // Both actions are worth 0 in state 0: the first listed wins.
        let (action, value) = values.greedy_action(&Line, &0, 0.9).unwrap();
        assert_eq!(action, "s");
        assert_abs_diff_eq!(value, 0.0);
        assert!(values.greedy_action(&Line, &2, 0.9).is_none());
    }

    #[test]
    fn extract_policy_skips_terminal_states() {
        let values = TabularValueFunction::with_values(0.0, [(1_u8, 1.0)]);
        let policy = values.extract_policy(&Line, 0.9);
        assert_eq!(policy.action(&0), Some("r"));
        assert_eq!(policy.action(&1), Some("r"));
        assert_eq!(policy.action(&2), None);
        assert_eq!(policy.len(), 2);
    }
}
