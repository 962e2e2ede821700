//! Events emitted by the session loop for the presentation layer.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use super::InstanceId;
use crate::spawn::SpawnReason;

/// Most ticks emit only a handful of events.
pub type EventList = SmallVec<[SessionEvent; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Too many items fell past the bound in a row.
    ConsecutiveMisses,
    /// Repetition target reached.
    TargetReached,
    /// Player quit early; counters are kept.
    Quit,
}

impl EndReason {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::TargetReached)
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConsecutiveMisses => write!(f, "consecutive_misses"),
            Self::TargetReached => write!(f, "target_reached"),
            Self::Quit => write!(f, "quit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Spawned {
        instance: InstanceId,
        item_id: String,
        lane: f32,
        newly_unlocked: bool,
        reason: SpawnReason,
    },
    Unlocked {
        item_id: String,
    },
    Missed {
        instance: InstanceId,
        item_id: String,
        lives: u32,
        consecutive_misses: u32,
    },
    Hit {
        instance: InstanceId,
        item_id: String,
        points: u32,
    },
    Ended {
        reason: EndReason,
    },
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickOutcome {
    pub events: EventList,
    pub ended: Option<EndReason>,
}

/// Result of a tap.
#[derive(Debug, Clone, PartialEq)]
pub enum TapOutcome {
    Hit { points: u32, events: EventList },
    /// The instance is gone already (missed in the same window); not an error.
    Ignored,
}

impl TapOutcome {
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }
}
