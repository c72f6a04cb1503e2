//! Configuration loading and hyper-parameter validation helpers

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::{RLError, Result};

/// Parse a configuration value from a JSON string
pub fn from_json_str<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse a configuration value from a JSON file
pub fn from_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let json = std::fs::read_to_string(path)?;
    from_json_str(&json)
}

/// Reject `value` unless it is finite and lies in `[low, high]`
pub fn ensure_in_range(name: &str, value: f64, low: f64, high: f64) -> Result<()> {
    if value.is_finite() && (low..=high).contains(&value) {
        Ok(())
    } else {
        Err(RLError::config(format!(
            "{name} must be in [{low}, {high}], got {value}"
        )))
    }
}

/// Reject `value` unless it is finite and strictly positive
pub fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RLError::config(format!("{name} must be positive, got {value}")))
    }
}

/// Reject a zero count
pub fn ensure_nonzero(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        Err(RLError::config(format!("{name} must be at least 1")))
    } else {
        Ok(())
    }
}
