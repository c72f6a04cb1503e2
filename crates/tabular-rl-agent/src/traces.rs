//! Replacing eligibility traces

use std::collections::HashMap;

use tabular_rl_core::State;

/// Traces weaker than this are dropped
pub const TRACE_THRESHOLD: f64 = 1e-8;

/// Per-state eligibility with replacing semantics
///
/// Visiting a state sets its trace to exactly 1 rather than adding to it,
/// so no trace ever exceeds 1.
#[derive(Debug, Clone)]
pub struct ReplacingTraces<S> {
    traces: HashMap<S, f64>,
}

impl<S: State> ReplacingTraces<S> {
    /// Create an empty trace table
    #[must_use]
    pub fn new() -> Self {
        Self {
            traces: HashMap::new(),
        }
    }

    /// Forget every trace; called at the start of each episode
    pub fn clear(&mut self) {
        self.traces.clear();
    }

    /// Decay every trace by `decay`, then replace the trace of `visited` with 1
    pub fn advance(&mut self, visited: S, decay: f64) {
        for trace in self.traces.values_mut() {
            *trace *= decay;
        }
        self.traces.insert(visited, 1.0);
    }

    /// Drop traces below [`TRACE_THRESHOLD`]
    pub fn prune(&mut self) {
        self.traces.retain(|_, trace| trace.abs() >= TRACE_THRESHOLD);
    }

    /// Trace of `state`, 0 when absent
    #[must_use]
    pub fn get(&self, state: &S) -> f64 {
        self.traces.get(state).copied().unwrap_or(0.0)
    }

    /// Number of live traces
    #[must_use]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Check if no trace is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Iterate over live traces in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&S, f64)> {
        self.traces.iter().map(|(s, z)| (s, *z))
    }
}

impl<S: State> Default for ReplacingTraces<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn revisit_resets_to_one() {
        let mut traces = ReplacingTraces::new();
        traces.advance('x', 0.5);
        traces.advance('y', 0.5);
        assert_abs_diff_eq!(traces.get(&'x'), 0.5);
        traces.advance('x', 0.5);
        assert_eq!(traces.get(&'x'), 1.0);
        assert_abs_diff_eq!(traces.get(&'y'), 0.5);
    }

    #[test]
    fn zero_decay_leaves_only_the_visited_state() {
        let mut traces = ReplacingTraces::new();
        traces.advance(1, 0.0);
        traces.advance(2, 0.0);
        traces.prune();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces.get(&2), 1.0);
        assert_eq!(traces.get(&1), 0.0);
    }

    #[test]
    fn weak_traces_are_pruned() {
        let mut traces = ReplacingTraces::new();
        traces.advance("old", 1.0);
        for _ in 0..30 {
            traces.advance("new", 0.5);
        }
        traces.prune();
        assert_eq!(traces.len(), 1);
        traces.clear();
        assert!(traces.is_empty());
    }

    proptest! {
        #[test]
        fn traces_never_exceed_one(
            visits in proptest::collection::vec(0u8..5, 1..200),
            decay in 0.0f64..=1.0,
        ) {
            let mut traces = ReplacingTraces::new();
            for state in visits {
                traces.advance(state, decay);
                traces.prune();
                prop_assert_eq!(traces.get(&state), 1.0);
                prop_assert!(traces.iter().all(|(_, z)| (0.0..=1.0).contains(&z)));
            }
        }
    }
}
