//! Reward signal

use serde::{Deserialize, Serialize};

/// Reward signal from one environment transition
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Reward(pub f64);

impl Reward {
    /// Create a new reward
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the reward value
    #[must_use]
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Reward {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<Reward> for f64 {
    fn from(reward: Reward) -> Self {
        reward.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_and_from_f64() {
        let reward = Reward::from(0.5);
        assert_eq!(reward, Reward::new(0.5));
        assert_eq!(reward.value(), 0.5);
        assert_eq!(f64::from(reward), 0.5);
        assert!(Reward(1.0) > Reward::default());
    }
}
