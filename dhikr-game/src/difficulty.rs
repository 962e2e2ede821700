//! Two-phase difficulty ramp: speed rises in steps until it caps, after which
//! target concurrency rises instead.
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::mode::ConcurrencyBounds;
use crate::numbers::u32_to_f32;

const SPEED_EPSILON: f32 = 1e-4;
const MAX_SPEED_STEPS: u32 = 1_000;

/// Difficulty in effect at a point of active session time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyLevel {
    /// Travel units per configured tick.
    pub speed_per_tick: f32,
    pub target_concurrency: usize,
    /// Whether the speed schedule has reached its cap.
    pub speed_capped: bool,
}

/// Number of speed steps until the schedule reaches its cap.
#[must_use]
pub fn steps_to_cap(cfg: &SessionConfig) -> u32 {
    let mut steps = 0_u32;
    let mut speed = cfg.base_speed;
    while speed + SPEED_EPSILON < cfg.speed_cap && steps < MAX_SPEED_STEPS {
        steps += 1;
        speed = cfg.speed_step.mul_add(u32_to_f32(steps), cfg.base_speed);
    }
    steps
}

/// Speed (per reference tick) after `elapsed_ms` of active time.
#[must_use]
pub fn reference_speed(cfg: &SessionConfig, elapsed_ms: u64) -> f32 {
    let interval_ms = u64::from(cfg.speed_interval_secs) * 1_000;
    let steps = (elapsed_ms / interval_ms.max(1)).min(u64::from(MAX_SPEED_STEPS));
    let steps = u32::try_from(steps).unwrap_or(MAX_SPEED_STEPS);
    cfg.speed_step
        .mul_add(u32_to_f32(steps), cfg.base_speed)
        .min(cfg.speed_cap)
}

/// Difficulty after `elapsed_ms` of active (unpaused) session time.
#[must_use]
pub fn difficulty_at(
    cfg: &SessionConfig,
    elapsed_ms: u64,
    bounds: ConcurrencyBounds,
) -> DifficultyLevel {
    let speed = reference_speed(cfg, elapsed_ms);
    let cap_at_ms = u64::from(steps_to_cap(cfg)) * u64::from(cfg.speed_interval_secs) * 1_000;
    let speed_capped = elapsed_ms >= cap_at_ms;

    let initial = bounds.initial.min(bounds.max);
    let target_concurrency = if speed_capped {
        let freq_ms = (u64::from(cfg.frequency_interval_secs) * 1_000).max(1);
        let extra = (elapsed_ms - cap_at_ms) / freq_ms;
        let extra = usize::try_from(extra).unwrap_or(usize::MAX);
        initial.saturating_add(extra).min(bounds.max)
    } else {
        initial
    };

    DifficultyLevel {
        speed_per_tick: speed * cfg.tick_scale(),
        target_concurrency,
        speed_capped,
    }
}
