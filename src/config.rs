//! System configuration parameters
//!
//! All tunable parameters for the PetFeeder core.
//! Values can be overridden from storage (see [`ConfigPort`](crate::app::ports::ConfigPort))
//! or from a JSON file at startup.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core feeder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederConfig {
    // --- Scheduler ---
    /// Scheduler wake-up interval (seconds)
    pub tick_interval_secs: u32,
    /// Look-back window: a rule is due while `now - window <= time <= now`
    pub tick_window_secs: u32,

    // --- Sensors ---
    /// Threshold-check interval (seconds)
    pub sensor_poll_interval_secs: u32,
    /// A cached reading older than this is reported as stale (seconds)
    pub sensor_stale_after_secs: u32,
    /// Per-read deadline (milliseconds)
    pub sensor_timeout_ms: u32,
    /// Water below this level raises a low-water alert (0-100%)
    pub low_water_percent: u8,
    /// Food below this weight raises a low-food alert (grams)
    pub low_food_grams: u32,

    // --- Actuator ---
    /// Per-rotation deadline (milliseconds)
    pub actuator_timeout_ms: u32,
    /// Portion for a manual dispense (grams)
    pub manual_portion_grams: u32,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            // Scheduler
            tick_interval_secs: 15,
            tick_window_secs: 60,

            // Sensors
            sensor_poll_interval_secs: 30,
            sensor_stale_after_secs: 120,
            sensor_timeout_ms: 2_000,
            low_water_percent: 10,
            low_food_grams: 50,

            // Actuator
            actuator_timeout_ms: 15_000,
            manual_portion_grams: 25,
        }
    }
}

impl FeederConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("tick_interval_secs must be > 0"));
        }
        if self.tick_window_secs < self.tick_interval_secs {
            return Err(ConfigError::ValidationFailed(
                "tick_window_secs must be >= tick_interval_secs",
            ));
        }
        if self.tick_window_secs > 3_600 {
            return Err(ConfigError::ValidationFailed("tick_window_secs must be <= 3600"));
        }
        if self.sensor_poll_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "sensor_poll_interval_secs must be > 0",
            ));
        }
        if self.sensor_stale_after_secs < self.sensor_poll_interval_secs {
            return Err(ConfigError::ValidationFailed(
                "sensor_stale_after_secs must be >= sensor_poll_interval_secs",
            ));
        }
        if self.sensor_timeout_ms == 0 || self.actuator_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("timeouts must be > 0"));
        }
        if self.low_water_percent > 100 {
            return Err(ConfigError::ValidationFailed("low_water_percent must be 0-100"));
        }
        if !(1..=1_000).contains(&self.manual_portion_grams) {
            return Err(ConfigError::ValidationFailed(
                "manual_portion_grams must be 1-1000",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document; missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs as u64)
    }

    pub fn sensor_poll_interval(&self) -> Duration {
        Duration::from_secs(self.sensor_poll_interval_secs as u64)
    }

    pub fn sensor_stale_after(&self) -> Duration {
        Duration::from_secs(self.sensor_stale_after_secs as u64)
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms as u64)
    }

    pub fn actuator_timeout(&self) -> Duration {
        Duration::from_millis(self.actuator_timeout_ms as u64)
    }
}
