//! State identifiers and episode termination status

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Trait for states of a finite MDP
///
/// States are opaque keys: algorithms only compare them and use them as
/// table keys. Any `Clone + Eq + Hash + Debug` type qualifies.
pub trait State: Clone + Eq + Hash + Debug {}

impl<T> State for T where T: Clone + Eq + Hash + Debug {}

/// How an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminal {
    /// Not a terminal state
    No,
    /// Terminal state (episode ends)
    Yes,
    /// Truncated (step cap reached)
    Truncated,
}

impl Terminal {
    /// Check if the state is terminal (either Yes or Truncated)
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::No)
    }

    /// Check if the episode was cut off by a step cap
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated)
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::No
    }
}
