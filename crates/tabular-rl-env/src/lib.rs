//! Finite MDP environments for tabular reinforcement learning
//!
//! Every environment here exposes its full transition model through
//! [`Mdp`] so it can be solved by dynamic programming, and can also be
//! sampled step by step through [`Environment`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod grid_world;

pub use grid_world::{Cell, Direction, GridWorld, GridWorldConfig};

// Re-export core types
pub use tabular_rl_core::{Environment, Mdp, Step};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{Cell, Direction, GridWorld, GridWorldConfig};
    pub use tabular_rl_core::prelude::*;
}
