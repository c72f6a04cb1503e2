//! Tabular solvers for finite MDPs
//!
//! This crate provides:
//! - Model-based dynamic programming: [`PolicyIteration`], [`ValueIteration`]
//! - Sample-based control and prediction: [`MonteCarloControl`], [`TdZero`],
//!   [`TdLambda`]
//!
//! Sample-based learners own an injected generator (`StdRng` by default,
//! seeded from their config), so two runs with the same seed and
//! environment produce the same tables.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod monte_carlo;
pub mod policy_iteration;
pub mod td;
pub mod td_lambda;
pub mod traces;
pub mod utils;
pub mod value_iteration;

// Re-export solvers
pub use monte_carlo::{MonteCarloConfig, MonteCarloControl, VisitMode};
pub use policy_iteration::{PolicyIteration, PolicyIterationConfig};
pub use td::{TdConfig, TdZero};
pub use td_lambda::{TdLambda, TdLambdaConfig};
pub use value_iteration::{ValueIteration, ValueIterationConfig};

// Re-export utilities
pub use traces::ReplacingTraces;
pub use utils::{
    moving_average, EpisodeStats, ExplorationSchedule, ExponentialSchedule, LinearSchedule,
    Schedule, SolveReport, TrainingSummary,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        MonteCarloConfig, MonteCarloControl, PolicyIteration, PolicyIterationConfig,
        SolveReport, TdConfig, TdLambda, TdLambdaConfig, TdZero, TrainingSummary,
        ValueIteration, ValueIterationConfig,
    };
    pub use tabular_rl_core::prelude::*;
}
