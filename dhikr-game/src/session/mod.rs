//! Real-time session primitives: the state owned by one running session and
//! the read-only summary handed off when it ends.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::mode::GameMode;
use crate::spawn::SpawnError;

pub mod event;
pub mod intent;
pub mod runner;

pub use event::{EndReason, EventList, SessionEvent, TapOutcome, TickOutcome};
pub use intent::{SessionIntent, StepOutcome};
pub use runner::{SessionLoop, SessionSetup};

/// Identifier of one on-screen item instance, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Running,
    Paused,
    Ended(EndReason),
}

impl SessionPhase {
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    #[must_use]
    pub const fn is_ended(self) -> bool {
        matches!(self, Self::Ended(_))
    }
}

/// A falling item currently on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveItemInstance {
    pub instance_id: InstanceId,
    pub item_id: String,
    pub travel_progress: f32,
    /// Vertical position in percent of the play field.
    pub lane: f32,
    pub spawned_as_newly_unlocked: bool,
}

/// Counters mutated only by the session loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub mode: GameMode,
    pub score: u64,
    pub lives: u32,
    pub consecutive_misses: u32,
    pub tap_count: u64,
    pub miss_count: u64,
    pub started_at: DateTime<Utc>,
    pub items_seen_count: u64,
    /// Active (unpaused) time; pause does not advance it.
    pub elapsed_ms: u64,
    pub ticks: u64,
    pub per_item_taps: BTreeMap<String, u64>,
}

impl SessionState {
    #[must_use]
    pub fn new(mode: GameMode, lives: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            score: 0,
            lives,
            consecutive_misses: 0,
            tap_count: 0,
            miss_count: 0,
            started_at,
            items_seen_count: 0,
            elapsed_ms: 0,
            ticks: 0,
            per_item_taps: BTreeMap::new(),
        }
    }
}

/// Read-only result of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub mode: GameMode,
    pub score: u64,
    pub tap_count: u64,
    pub miss_count: u64,
    pub lives_remaining: u32,
    pub items_seen: u64,
    pub elapsed_ms: u64,
    pub started_at: DateTime<Utc>,
    pub per_item_taps: BTreeMap<String, u64>,
    /// Items first unlocked during this session, in unlock order.
    pub newly_unlocked: Vec<String>,
    pub rescues_granted: u32,
    /// Draws taken from the spawn and lane streams; equal across replays of a seed.
    #[serde(default)]
    pub rng_draws: u64,
    pub end_reason: Option<EndReason>,
}

impl SessionSummary {
    #[must_use]
    pub const fn duration_secs(&self) -> u64 {
        crate::numbers::ms_to_secs(self.elapsed_ms)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("session is {0:?}, not running")]
    NotRunning(SessionPhase),
    #[error("cannot {action} a session that is {from:?}")]
    InvalidTransition {
        from: SessionPhase,
        action: &'static str,
    },
    #[error("item `{0}` is not in the catalog")]
    UnknownItem(String),
    #[error("target repetition count must be positive")]
    ZeroTarget,
    #[error("nothing is unlocked at session start")]
    NothingUnlocked,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}
