use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Thresholds and timing for an [`EventStore`](crate::EventStore)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Period of the maintenance tick
    pub tick_interval_ms: u64,

    /// Pending events merged even while paused once this many are queued
    pub pending_overflow_threshold: usize,

    /// Event count above which a slow view update triggers eviction
    pub count_threshold: usize,

    /// View update duration (ms) considered slow
    pub slow_update_threshold_ms: u64,

    /// Free memory percentage under which a rise triggers eviction
    pub free_memory_threshold: f64,

    /// Rise in free memory percentage points that counts as a collection
    pub free_memory_rise: f64,

    /// Share of the oldest events considered for eviction
    pub evict_fraction: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            pending_overflow_threshold: 4096,
            count_threshold: 50_000,
            slow_update_threshold_ms: 100,
            free_memory_threshold: 10.0,
            free_memory_rise: 5.0,
            evict_fraction: 0.5,
        }
    }
}

impl StoreConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject values the maintenance loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(StoreError::InvalidConfig(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.pending_overflow_threshold == 0 {
            return Err(StoreError::InvalidConfig(
                "pending_overflow_threshold must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.evict_fraction) {
            return Err(StoreError::InvalidConfig(format!(
                "evict_fraction {} not within [0, 1]",
                self.evict_fraction
            )));
        }
        for (name, value) in [
            ("free_memory_threshold", self.free_memory_threshold),
            ("free_memory_rise", self.free_memory_rise),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(StoreError::InvalidConfig(format!(
                    "{name} {value} not within [0, 100]"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.pending_overflow_threshold, 4096);
        assert_eq!(config.count_threshold, 50_000);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"count_threshold": 10, "evict_fraction": 0.25}"#).unwrap();
        assert_eq!(config.count_threshold, 10);
        assert_eq!(config.evict_fraction, 0.25);
        assert_eq!(config.slow_update_threshold_ms, 100);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = StoreConfig {
            evict_fraction: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfig(_))
        ));

        let config = StoreConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            free_memory_threshold: 120.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
