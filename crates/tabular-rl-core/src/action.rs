//! Action identifiers

use std::fmt::Debug;
use std::hash::Hash;

/// Trait for actions of a finite MDP
///
/// Like [`State`](crate::State), actions are opaque keys. The order in which
/// an environment lists legal actions is the tie-break order for every
/// argmax in this workspace.
pub trait Action: Clone + Eq + Hash + Debug {}

impl<T> Action for T where T: Clone + Eq + Hash + Debug {}

