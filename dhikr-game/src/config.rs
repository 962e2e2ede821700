//! Session tuning configuration with validation.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    BASE_SPEED, DEFAULT_TICK_MS, FREQUENCY_STEP_INTERVAL_SECS, LANE_MAX, LANE_MIN,
    LANE_MIN_SPACING, MAX_TICK_MS, NEW_ITEM_HIGHLIGHT_SPAWNS, REFERENCE_TICK_MS, SPEED_CAP,
    SPEED_STEP, SPEED_STEP_INTERVAL_SECS, STARTING_LIVES, TRAVEL_END, TRAVEL_START,
};
use crate::numbers::u32_to_f32;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tick quantum must be between 1 and {max} ms (got {value})")]
    TickOutOfRange { value: u32, max: u32 },
    #[error("{field} must be positive (got {value:.3})")]
    NonPositive { field: &'static str, value: f32 },
    #[error("speed cap {cap:.3} is below base speed {base:.3}")]
    CapBelowBase { base: f32, cap: f32 },
    #[error("{field} must be non-zero")]
    ZeroInterval { field: &'static str },
    #[error("{field} bounds invalid (min {min:.2} >= max {max:.2})")]
    InvertedBounds {
        field: &'static str,
        min: f32,
        max: f32,
    },
}

/// Tuning knobs for a session. Speeds are expressed per 50 ms reference tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_tick_ms")]
    pub tick_ms: u32,
    #[serde(default = "SessionConfig::default_travel_start")]
    pub travel_start: f32,
    #[serde(default = "SessionConfig::default_travel_end")]
    pub travel_end: f32,
    #[serde(default = "SessionConfig::default_base_speed")]
    pub base_speed: f32,
    #[serde(default = "SessionConfig::default_speed_step")]
    pub speed_step: f32,
    #[serde(default = "SessionConfig::default_speed_cap")]
    pub speed_cap: f32,
    #[serde(default = "SessionConfig::default_speed_interval_secs")]
    pub speed_interval_secs: u32,
    #[serde(default = "SessionConfig::default_frequency_interval_secs")]
    pub frequency_interval_secs: u32,
    #[serde(default = "SessionConfig::default_starting_lives")]
    pub starting_lives: u32,
    #[serde(default = "SessionConfig::default_lane_min")]
    pub lane_min: f32,
    #[serde(default = "SessionConfig::default_lane_max")]
    pub lane_max: f32,
    #[serde(default = "SessionConfig::default_lane_spacing")]
    pub lane_spacing: f32,
    #[serde(default = "SessionConfig::default_highlight_spawns")]
    pub highlight_spawns: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_ms: Self::default_tick_ms(),
            travel_start: Self::default_travel_start(),
            travel_end: Self::default_travel_end(),
            base_speed: Self::default_base_speed(),
            speed_step: Self::default_speed_step(),
            speed_cap: Self::default_speed_cap(),
            speed_interval_secs: Self::default_speed_interval_secs(),
            frequency_interval_secs: Self::default_frequency_interval_secs(),
            starting_lives: Self::default_starting_lives(),
            lane_min: Self::default_lane_min(),
            lane_max: Self::default_lane_max(),
            lane_spacing: Self::default_lane_spacing(),
            highlight_spawns: Self::default_highlight_spawns(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn default_tick_ms() -> u32 {
        DEFAULT_TICK_MS
    }

    #[must_use]
    pub const fn default_travel_start() -> f32 {
        TRAVEL_START
    }

    #[must_use]
    pub const fn default_travel_end() -> f32 {
        TRAVEL_END
    }

    #[must_use]
    pub const fn default_base_speed() -> f32 {
        BASE_SPEED
    }

    #[must_use]
    pub const fn default_speed_step() -> f32 {
        SPEED_STEP
    }

    #[must_use]
    pub const fn default_speed_cap() -> f32 {
        SPEED_CAP
    }

    #[must_use]
    pub const fn default_speed_interval_secs() -> u32 {
        SPEED_STEP_INTERVAL_SECS
    }

    #[must_use]
    pub const fn default_frequency_interval_secs() -> u32 {
        FREQUENCY_STEP_INTERVAL_SECS
    }

    #[must_use]
    pub const fn default_starting_lives() -> u32 {
        STARTING_LIVES
    }

    #[must_use]
    pub const fn default_lane_min() -> f32 {
        LANE_MIN
    }

    #[must_use]
    pub const fn default_lane_max() -> f32 {
        LANE_MAX
    }

    #[must_use]
    pub const fn default_lane_spacing() -> f32 {
        LANE_MIN_SPACING
    }

    #[must_use]
    pub const fn default_highlight_spawns() -> u8 {
        NEW_ITEM_HIGHLIGHT_SPAWNS
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 || self.tick_ms > MAX_TICK_MS {
            return Err(ConfigError::TickOutOfRange {
                value: self.tick_ms,
                max: MAX_TICK_MS,
            });
        }
        for (field, value) in [
            ("base_speed", self.base_speed),
            ("speed_step", self.speed_step),
            ("speed_cap", self.speed_cap),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        if self.speed_cap < self.base_speed {
            return Err(ConfigError::CapBelowBase {
                base: self.base_speed,
                cap: self.speed_cap,
            });
        }
        if self.speed_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "speed_interval_secs",
            });
        }
        if self.frequency_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "frequency_interval_secs",
            });
        }
        if self.travel_start >= self.travel_end {
            return Err(ConfigError::InvertedBounds {
                field: "travel",
                min: self.travel_start,
                max: self.travel_end,
            });
        }
        if self.lane_min >= self.lane_max {
            return Err(ConfigError::InvertedBounds {
                field: "lane",
                min: self.lane_min,
                max: self.lane_max,
            });
        }
        Ok(())
    }

    /// Factor converting reference-tick speeds into the configured quantum.
    #[must_use]
    pub fn tick_scale(&self) -> f32 {
        u32_to_f32(self.tick_ms) / u32_to_f32(REFERENCE_TICK_MS)
    }
}
