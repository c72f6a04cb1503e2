//! Tabular action-value function Q(s, a)

use std::collections::HashMap;

use crate::{Action, State};

/// Tabular Q-function with a blending rate
///
/// `update` moves an entry towards a target by `alpha`; with `alpha = 1`
/// it overwrites the entry, which is how the return-averaging and
/// improvement steps assign values.
#[derive(Debug, Clone)]
pub struct QTable<S, A> {
    /// Q-value table, one row per state
    q_values: HashMap<S, HashMap<A, f64>>,
    /// Blending rate for `update`
    alpha: f64,
    /// Default Q-value
    default_q_value: f64,
}

impl<S: State, A: Action> QTable<S, A> {
    /// Create a new, empty Q-table
    #[must_use]
    pub fn new(alpha: f64, default_q_value: f64) -> Self {
        Self {
            q_values: HashMap::new(),
            alpha,
            default_q_value,
        }
    }

    /// Q-value of `(state, action)`, or the default when it was never set
    #[must_use]
    pub fn q_value(&self, state: &S, action: &A) -> f64 {
        self.q_values
            .get(state)
            .and_then(|row| row.get(action))
            .copied()
            .unwrap_or(self.default_q_value)
    }

    /// `Q(s, a) ← Q(s, a) + α·(target − Q(s, a))`
    pub fn update(&mut self, state: S, action: A, target: f64) {
        let default = self.default_q_value;
        let entry = self
            .q_values
            .entry(state)
            .or_default()
            .entry(action)
            .or_insert(default);
        *entry += self.alpha * (target - *entry);
    }

    /// Largest Q-value among `actions`, or the default when `actions` is empty
    #[must_use]
    pub fn max_q(&self, state: &S, actions: &[A]) -> f64 {
        self.best_action_value(state, actions)
            .map_or(self.default_q_value, |(_, value)| value)
    }

    /// `argmax_a Q(s, a)` over `actions`; ties go to the earliest action
    #[must_use]
    pub fn best_action(&self, state: &S, actions: &[A]) -> Option<A> {
        self.best_action_value(state, actions).map(|(action, _)| action)
    }

    /// Best action together with its Q-value
    #[must_use]
    pub fn best_action_value(&self, state: &S, actions: &[A]) -> Option<(A, f64)> {
        let mut best: Option<(&A, f64)> = None;
        for action in actions {
            let value = self.q_value(state, action);
            if best.map_or(true, |(_, best_value)| value > best_value) {
                best = Some((action, value));
            }
        }
        best.map(|(action, value)| (action.clone(), value))
    }

    /// Blending rate used by `update`
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Value returned for unseen pairs
    #[must_use]
    pub fn default_q_value(&self) -> f64 {
        self.default_q_value
    }

    /// Number of explicit `(state, action)` entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.q_values.values().map(HashMap::len).sum()
    }

    /// Check if nothing has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over explicit entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&S, &A, f64)> {
        self.q_values
            .iter()
            .flat_map(|(s, row)| row.iter().map(move |(a, q)| (s, a, *q)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn unseen_pair_returns_default() {
        let table = QTable::<&str, u8>::new(0.1, 0.5);
        assert_eq!(table.q_value(&"s", &3), 0.5);
        assert!(table.is_empty());
    }

    #[test]
    fn update_blends_towards_target() {
        let mut table = QTable::new(0.1, 0.0);
        table.update("s", 0_u8, 1.0);
        assert_abs_diff_eq!(table.q_value(&"s", &0), 0.1);
        table.update("s", 0_u8, 1.0);
        assert_abs_diff_eq!(table.q_value(&"s", &0), 0.19);
    }

    #[test]
    fn alpha_one_overwrites() {
        let mut table = QTable::new(1.0, 0.0);
        table.update("s", 0_u8, 3.5);
        table.update("s", 0_u8, -2.0);
        assert_eq!(table.q_value(&"s", &0), -2.0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn argmax_and_max() {
        let mut table = QTable::new(1.0, 0.0);
        table.update("s", 1_u8, 2.0);
        table.update("s", 2_u8, 5.0);
        assert_eq!(table.best_action(&"s", &[0, 1, 2]), Some(2));
        assert_eq!(table.max_q(&"s", &[0, 1, 2]), 5.0);
        assert_eq!(table.max_q(&"s", &[]), 0.0);
        assert_eq!(table.best_action(&"s", &[]), None);
    }

    #[test]
    fn ties_go_to_first_action() {
        let table = QTable::<&str, u8>::new(1.0, 0.0);
        assert_eq!(table.best_action(&"s", &[3, 1, 2]), Some(3));
    }

    proptest! {
        #[test]
        fn default_lookup_never_inserts(default in -10.0f64..10.0, s in 0u32..100, a in 0u32..10) {
            let table = QTable::<u32, u32>::new(0.5, default);
            prop_assert_eq!(table.q_value(&s, &a), default);
            prop_assert!(table.is_empty());
        }

        #[test]
        fn best_action_attains_max(values in proptest::collection::vec(-5.0f64..5.0, 1..8)) {
            let mut table = QTable::new(1.0, 0.0);
            let actions: Vec<usize> = (0..values.len()).collect();
            for (a, v) in values.iter().enumerate() {
                table.update(0_u8, a, *v);
            }
            let best = table.best_action(&0, &actions).unwrap();
            prop_assert_eq!(table.q_value(&0, &best), table.max_q(&0, &actions));
            prop_assert!(values.iter().all(|v| *v <= table.max_q(&0, &actions)));
        }
    }
}
