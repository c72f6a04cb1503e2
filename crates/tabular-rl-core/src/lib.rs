//! Core traits and tabular representations for finite-MDP reinforcement learning
//!
//! This crate provides the environment contract ([`Mdp`], [`Environment`])
//! and the tables every solver reads and mutates: [`TabularValueFunction`],
//! [`QTable`] and [`TabularPolicy`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod config;
pub mod environment;
pub mod error;
pub mod policy;
pub mod qtable;
pub mod reward;
pub mod state;
pub mod trajectory;
pub mod value;

// Re-export core traits and types
pub use action::Action;
pub use environment::{validate_model, Environment, Mdp, Step};
pub use error::{RLError, Result};
pub use policy::{EpsilonGreedy, Policy, TabularPolicy};
pub use qtable::QTable;
pub use reward::Reward;
pub use state::{State, Terminal};
pub use trajectory::{discounted_returns, Episode, EpisodeStep, Transition};
pub use value::{TabularValueFunction, ValueFunction};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Action, Environment, EpsilonGreedy, Mdp, Policy, QTable, Result, Reward, State, Step,
        TabularPolicy, TabularValueFunction,
    };
}
