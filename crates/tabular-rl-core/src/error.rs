//! Error types for the tabular RL core library

use thiserror::Error;

/// Core error type for tabular RL operations
#[derive(Error, Debug)]
pub enum RLError {
    /// Environment-related errors
    #[error("Environment error: {0}")]
    Environment(String),

    /// Action not legal in the current state
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// State outside the environment's state space
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Transition model that violates the MDP contract
    #[error("Invalid transition model: {0}")]
    InvalidModel(String),

    /// Hyper-parameter or environment configuration out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RLError {
    /// Shorthand for an [`RLError::InvalidConfig`] with a formatted message
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias for RL operations
pub type Result<T> = std::result::Result<T, RLError>;

