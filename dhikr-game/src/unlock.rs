//! Mapping from cumulative progress to the unlocked slice of a catalog.
//!
//! Two named strategies exist: point thresholds compare each item's
//! `unlock_threshold` against the progress value, while tap-count unlocking
//! opens the first `base + taps / taps_per_unlock` catalog entries. Both are
//! monotonic in progress and never fail on out-of-range input.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::{Catalog, PracticeItem};

/// Which progress counter drives unlocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMetric {
    Points,
    Taps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum UnlockPolicy {
    /// Unlock every item whose threshold is at or below the progress value.
    PointThreshold,
    /// Unlock the first `base_unlocked + taps / taps_per_unlock` items.
    TapCount {
        base_unlocked: usize,
        taps_per_unlock: u64,
    },
    /// Only the one selected item is ever playable.
    Single,
}

impl UnlockPolicy {
    /// Items available at `progress`, in catalog order.
    #[must_use]
    pub fn unlocked_items<'c>(&self, progress: u64, catalog: &'c Catalog) -> Vec<&'c PracticeItem> {
        match *self {
            Self::PointThreshold => catalog
                .items()
                .iter()
                .filter(|item| item.unlock_threshold <= progress)
                .collect(),
            Self::TapCount { .. } | Self::Single => {
                let count = self.unlocked_count(progress, catalog);
                catalog.items().iter().take(count).collect()
            }
        }
    }

    /// Number of unlocked items at `progress`.
    #[must_use]
    pub fn unlocked_count(&self, progress: u64, catalog: &Catalog) -> usize {
        match *self {
            Self::PointThreshold => catalog
                .items()
                .iter()
                .filter(|item| item.unlock_threshold <= progress)
                .count(),
            Self::TapCount {
                base_unlocked,
                taps_per_unlock,
            } => {
                let earned = progress
                    .checked_div(taps_per_unlock)
                    .and_then(|n| usize::try_from(n).ok())
                    .unwrap_or(usize::MAX);
                base_unlocked.saturating_add(earned).min(catalog.len())
            }
            Self::Single => catalog.len().min(1),
        }
    }
}

/// `{ item.id : item is unlocked at progress }` for the given strategy.
#[must_use]
pub fn unlocked_ids(policy: UnlockPolicy, progress: u64, catalog: &Catalog) -> BTreeSet<String> {
    policy
        .unlocked_items(progress, catalog)
        .into_iter()
        .map(|item| item.id.clone())
        .collect()
}
