//! Game modes and the capability interface the session loop is written against.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::PracticeItem;
use crate::constants::{
    FOCUS_BOOTSTRAP_SPAWNS, MAX_CONCURRENT_ITEMS, NAMES_BASE_UNLOCKED, NAMES_POINTS_PER_TAP,
    NAMES_TAPS_PER_UNLOCK, RESCUE_GRANT_CAP, RESCUE_MISS_THRESHOLD, STANDARD_INITIAL_CONCURRENCY,
    STANDARD_MISS_CAP, TASBIH_CONCURRENCY, TASBIH_MISS_CAP,
};
use crate::unlock::{ProgressMetric, UnlockPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Phrase practice scored by point value, unlocking by lifetime points.
    Focus,
    /// Divine names, unlocking one more name every 33 taps.
    Names,
    /// A single pre-selected phrase repeated toward a target count.
    Tasbih,
}

impl GameMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::Names => "names",
            Self::Tasbih => "tasbih",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a session decides it is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationPolicy {
    /// Consecutive misses that end the session.
    pub consecutive_miss_cap: u32,
    /// Whether misses also cost a life.
    pub uses_lives: bool,
    /// Success termination once this many taps land.
    pub target_taps: Option<u64>,
}

/// How the scheduler chooses items for a mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpawnPolicy {
    Weighted {
        bootstrap_spawns: u32,
        rescue_miss_threshold: u32,
        rescue_grant_cap: u32,
    },
    Fixed {
        item_id: String,
    },
}

/// Target number of on-screen items at the start and at the end of the ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyBounds {
    pub initial: usize,
    pub max: usize,
}

/// Mode capability interface.
pub trait ModeRules: fmt::Debug {
    fn mode(&self) -> GameMode;

    fn progress_metric(&self) -> ProgressMetric;

    fn unlock_policy(&self) -> UnlockPolicy;

    /// Score awarded immediately for a tap on `item`.
    fn score_on_tap(&self, item: &PracticeItem) -> u32;

    /// Score awarded when the session ends by reaching its target.
    fn completion_bonus(&self, _item: &PracticeItem, _taps: u64) -> u32 {
        0
    }

    fn termination_policy(&self) -> TerminationPolicy;

    fn spawn_policy(&self) -> SpawnPolicy;

    fn concurrency(&self) -> ConcurrencyBounds {
        ConcurrencyBounds {
            initial: STANDARD_INITIAL_CONCURRENCY,
            max: MAX_CONCURRENT_ITEMS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FocusRules;

impl ModeRules for FocusRules {
    fn mode(&self) -> GameMode {
        GameMode::Focus
    }

    fn progress_metric(&self) -> ProgressMetric {
        ProgressMetric::Points
    }

    fn unlock_policy(&self) -> UnlockPolicy {
        UnlockPolicy::PointThreshold
    }

    fn score_on_tap(&self, item: &PracticeItem) -> u32 {
        item.point_value
    }

    fn termination_policy(&self) -> TerminationPolicy {
        TerminationPolicy {
            consecutive_miss_cap: STANDARD_MISS_CAP,
            uses_lives: true,
            target_taps: None,
        }
    }

    fn spawn_policy(&self) -> SpawnPolicy {
        SpawnPolicy::Weighted {
            bootstrap_spawns: FOCUS_BOOTSTRAP_SPAWNS,
            rescue_miss_threshold: RESCUE_MISS_THRESHOLD,
            rescue_grant_cap: RESCUE_GRANT_CAP,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NamesRules;

impl ModeRules for NamesRules {
    fn mode(&self) -> GameMode {
        GameMode::Names
    }

    fn progress_metric(&self) -> ProgressMetric {
        ProgressMetric::Taps
    }

    fn unlock_policy(&self) -> UnlockPolicy {
        UnlockPolicy::TapCount {
            base_unlocked: NAMES_BASE_UNLOCKED,
            taps_per_unlock: NAMES_TAPS_PER_UNLOCK,
        }
    }

    fn score_on_tap(&self, _item: &PracticeItem) -> u32 {
        NAMES_POINTS_PER_TAP
    }

    fn termination_policy(&self) -> TerminationPolicy {
        TerminationPolicy {
            consecutive_miss_cap: STANDARD_MISS_CAP,
            uses_lives: true,
            target_taps: None,
        }
    }

    fn spawn_policy(&self) -> SpawnPolicy {
        SpawnPolicy::Weighted {
            bootstrap_spawns: 0,
            rescue_miss_threshold: RESCUE_MISS_THRESHOLD,
            rescue_grant_cap: RESCUE_GRANT_CAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TasbihRules {
    pub item_id: String,
    pub target: u64,
}

impl ModeRules for TasbihRules {
    fn mode(&self) -> GameMode {
        GameMode::Tasbih
    }

    fn progress_metric(&self) -> ProgressMetric {
        ProgressMetric::Taps
    }

    fn unlock_policy(&self) -> UnlockPolicy {
        UnlockPolicy::Single
    }

    fn score_on_tap(&self, _item: &PracticeItem) -> u32 {
        0
    }

    fn completion_bonus(&self, item: &PracticeItem, taps: u64) -> u32 {
        let taps = u32::try_from(taps).unwrap_or(u32::MAX);
        item.point_value.saturating_mul(taps)
    }

    fn termination_policy(&self) -> TerminationPolicy {
        TerminationPolicy {
            consecutive_miss_cap: TASBIH_MISS_CAP,
            uses_lives: false,
            target_taps: Some(self.target),
        }
    }

    fn spawn_policy(&self) -> SpawnPolicy {
        SpawnPolicy::Fixed {
            item_id: self.item_id.clone(),
        }
    }

    fn concurrency(&self) -> ConcurrencyBounds {
        ConcurrencyBounds {
            initial: TASBIH_CONCURRENCY,
            max: TASBIH_CONCURRENCY,
        }
    }
}

/// Caller-facing mode choice for a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeSelection {
    Focus,
    Names,
    Tasbih { item_id: String, target: u64 },
}

impl ModeSelection {
    #[must_use]
    pub const fn mode(&self) -> GameMode {
        match self {
            Self::Focus => GameMode::Focus,
            Self::Names => GameMode::Names,
            Self::Tasbih { .. } => GameMode::Tasbih,
        }
    }

    /// Resolve the selection into its rule set.
    #[must_use]
    pub fn rules(&self) -> Box<dyn ModeRules> {
        match self {
            Self::Focus => Box::new(FocusRules),
            Self::Names => Box::new(NamesRules),
            Self::Tasbih { item_id, target } => Box::new(TasbihRules {
                item_id: item_id.clone(),
                target: *target,
            }),
        }
    }
}
