//! Spawn scheduling: which unlocked item appears next.
//!
//! Selection order per call:
//! 1. fixed-item modes always return their one item;
//! 2. bootstrap spawns force the easy item at session start;
//! 3. a rescue forces the easy item once per miss streak, up to a cap;
//! 4. otherwise a weighted draw over word-count tiers, excluding the easy item
//!    and avoiding an immediate repeat when the bucket allows it.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

use crate::catalog::{PracticeItem, WeightClass};
use crate::constants::{RECENT_SPAWN_WINDOW, WEIGHT_TIER_BOUNDS};
use crate::mode::SpawnPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpawnError {
    #[error("no unlocked items available to spawn")]
    NothingUnlocked,
    #[error("fixed item `{0}` is not among the unlocked items")]
    FixedItemUnavailable(String),
}

/// Why a particular item was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnReason {
    Fixed,
    Bootstrap,
    Rescue,
    Weighted,
    Fallback,
    NewlyUnlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnPick<'c> {
    pub item: &'c PracticeItem,
    pub reason: SpawnReason,
}

#[derive(Debug, Clone)]
pub struct SpawnScheduler {
    policy: SpawnPolicy,
    easy_item_id: String,
    bootstrap_remaining: u32,
    rescue_grants_remaining: u32,
    rescued_this_streak: bool,
    recent: VecDeque<String>,
}

impl SpawnScheduler {
    #[must_use]
    pub fn new(policy: SpawnPolicy, easy_item_id: &str) -> Self {
        let mut scheduler = Self {
            policy,
            easy_item_id: easy_item_id.to_string(),
            bootstrap_remaining: 0,
            rescue_grants_remaining: 0,
            rescued_this_streak: false,
            recent: VecDeque::with_capacity(RECENT_SPAWN_WINDOW),
        };
        scheduler.reset();
        scheduler
    }

    /// Restore session-start counters.
    pub fn reset(&mut self) {
        let (bootstrap, grants) = match self.policy {
            SpawnPolicy::Weighted {
                bootstrap_spawns,
                rescue_grant_cap,
                ..
            } => (bootstrap_spawns, rescue_grant_cap),
            SpawnPolicy::Fixed { .. } => (0, 0),
        };
        self.bootstrap_remaining = bootstrap;
        self.rescue_grants_remaining = grants;
        self.rescued_this_streak = false;
        self.recent.clear();
    }

    #[must_use]
    pub const fn bootstrap_remaining(&self) -> u32 {
        self.bootstrap_remaining
    }

    #[must_use]
    pub const fn rescue_grants_remaining(&self) -> u32 {
        self.rescue_grants_remaining
    }

    /// Rescues handed out since the last reset.
    #[must_use]
    pub fn rescues_granted(&self) -> u32 {
        match self.policy {
            SpawnPolicy::Weighted {
                rescue_grant_cap, ..
            } => rescue_grant_cap.saturating_sub(self.rescue_grants_remaining),
            SpawnPolicy::Fixed { .. } => 0,
        }
    }

    /// Most recent spawns, oldest first.
    pub fn recent_history(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    /// Note a spawn made outside `select_next_item` (newly unlocked items).
    pub fn record_spawn(&mut self, item_id: &str) {
        if self.recent.len() == RECENT_SPAWN_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(item_id.to_string());
    }

    /// Choose the next item to spawn.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` when nothing is unlocked or a fixed-item mode's
    /// item is missing; both indicate a misconfigured session.
    pub fn select_next_item<'c, R: Rng + ?Sized>(
        &mut self,
        unlocked: &[&'c PracticeItem],
        consecutive_misses: u32,
        rng: &mut R,
    ) -> Result<SpawnPick<'c>, SpawnError> {
        if unlocked.is_empty() {
            return Err(SpawnError::NothingUnlocked);
        }
        let pick = match &self.policy {
            SpawnPolicy::Fixed { item_id } => {
                let item = unlocked
                    .iter()
                    .copied()
                    .find(|item| &item.id == item_id)
                    .ok_or_else(|| SpawnError::FixedItemUnavailable(item_id.clone()))?;
                SpawnPick {
                    item,
                    reason: SpawnReason::Fixed,
                }
            }
            SpawnPolicy::Weighted {
                rescue_miss_threshold,
                ..
            } => {
                let threshold = *rescue_miss_threshold;
                self.select_weighted(unlocked, consecutive_misses, threshold, rng)
            }
        };
        self.record_spawn(&pick.item.id);
        log::debug!("spawn {} ({:?})", pick.item.id, pick.reason);
        Ok(pick)
    }

    fn select_weighted<'c, R: Rng + ?Sized>(
        &mut self,
        unlocked: &[&'c PracticeItem],
        consecutive_misses: u32,
        rescue_threshold: u32,
        rng: &mut R,
    ) -> SpawnPick<'c> {
        let easy = unlocked
            .iter()
            .copied()
            .find(|item| item.id == self.easy_item_id);

        if consecutive_misses < rescue_threshold {
            self.rescued_this_streak = false;
        }

        if let Some(easy) = easy {
            if self.bootstrap_remaining > 0 {
                self.bootstrap_remaining -= 1;
                return SpawnPick {
                    item: easy,
                    reason: SpawnReason::Bootstrap,
                };
            }
            if consecutive_misses >= rescue_threshold
                && !self.rescued_this_streak
                && self.rescue_grants_remaining > 0
            {
                self.rescue_grants_remaining -= 1;
                self.rescued_this_streak = true;
                return SpawnPick {
                    item: easy,
                    reason: SpawnReason::Rescue,
                };
            }
        }

        let mut buckets: [Vec<&'c PracticeItem>; 4] = Default::default();
        for item in unlocked.iter().copied() {
            if item.id != self.easy_item_id {
                buckets[item.weight_class.index()].push(item);
            }
        }

        let roll = rng.r#gen::<f64>();
        let chosen = WEIGHT_TIER_BOUNDS
            .iter()
            .position(|bound| roll < *bound)
            .unwrap_or(WeightClass::ALL.len() - 1);
        let order = (chosen..WeightClass::ALL.len()).chain(0..chosen);
        for tier in order {
            let bucket = &buckets[tier];
            if bucket.is_empty() {
                continue;
            }
            return SpawnPick {
                item: self.pick_avoiding_repeat(bucket, rng),
                reason: SpawnReason::Weighted,
            };
        }

        SpawnPick {
            item: self.pick_avoiding_repeat(unlocked, rng),
            reason: SpawnReason::Fallback,
        }
    }

    fn pick_avoiding_repeat<'c, R: Rng + ?Sized>(
        &self,
        pool: &[&'c PracticeItem],
        rng: &mut R,
    ) -> &'c PracticeItem {
        let last = self.recent.back();
        let fresh: Vec<&'c PracticeItem> = pool
            .iter()
            .copied()
            .filter(|item| Some(&item.id) != last)
            .collect();
        let candidates = if fresh.is_empty() {
            pool
        } else {
            fresh.as_slice()
        };
        candidates[rng.gen_range(0..candidates.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{FOCUS_BOOTSTRAP_SPAWNS, RESCUE_GRANT_CAP, RESCUE_MISS_THRESHOLD};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::collections::HashMap;

    fn focus_policy() -> SpawnPolicy {
        SpawnPolicy::Weighted {
            bootstrap_spawns: FOCUS_BOOTSTRAP_SPAWNS,
            rescue_miss_threshold: RESCUE_MISS_THRESHOLD,
            rescue_grant_cap: RESCUE_GRANT_CAP,
        }
    }

    fn items() -> Vec<PracticeItem> {
        vec![
            PracticeItem::new("easy", "SubhanAllah", 10, 0),
            PracticeItem::new("short", "Alhamdulillah", 10, 0),
            PracticeItem::new("other", "Allahu Akbar", 10, 0),
            PracticeItem::new("mid", "La ilaha illallah", 20, 0),
            PracticeItem::new("long", "La hawla wa la quwwata illa billah", 40, 0),
        ]
    }

    #[test]
    fn bootstrap_forces_easy_item_for_any_seed() {
        let owned = items();
        let unlocked: Vec<&PracticeItem> = owned.iter().collect();
        for seed in 0..64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut scheduler = SpawnScheduler::new(focus_policy(), "easy");
            for _ in 0..FOCUS_BOOTSTRAP_SPAWNS {
                let pick = scheduler.select_next_item(&unlocked, 0, &mut rng).unwrap();
                assert_eq!(pick.item.id, "easy");
                assert_eq!(pick.reason, SpawnReason::Bootstrap);
            }
            let pick = scheduler.select_next_item(&unlocked, 0, &mut rng).unwrap();
            assert_ne!(pick.item.id, "easy");
        }
    }

    #[test]
    fn rescue_fires_once_per_streak_up_to_cap() {
        let owned = items();
        let unlocked: Vec<&PracticeItem> = owned.iter().collect();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut scheduler = SpawnScheduler::new(focus_policy(), "easy");
        for _ in 0..FOCUS_BOOTSTRAP_SPAWNS {
            scheduler.select_next_item(&unlocked, 0, &mut rng).unwrap();
        }

        let rescue = scheduler.select_next_item(&unlocked, 3, &mut rng).unwrap();
        assert_eq!(rescue.reason, SpawnReason::Rescue);
        let same_streak = scheduler.select_next_item(&unlocked, 4, &mut rng).unwrap();
        assert_ne!(same_streak.reason, SpawnReason::Rescue);

        // A hit resets the streak, then a fresh streak earns the second grant.
        scheduler.select_next_item(&unlocked, 0, &mut rng).unwrap();
        let second = scheduler.select_next_item(&unlocked, 3, &mut rng).unwrap();
        assert_eq!(second.reason, SpawnReason::Rescue);
        assert_eq!(scheduler.rescues_granted(), 2);

        scheduler.select_next_item(&unlocked, 0, &mut rng).unwrap();
        let capped = scheduler.select_next_item(&unlocked, 3, &mut rng).unwrap();
        assert_ne!(capped.reason, SpawnReason::Rescue);
        assert_ne!(capped.item.id, "easy");
    }

    #[test]
    fn weighted_draws_favour_short_phrases_and_skip_easy() {
        let owned = items();
        let unlocked: Vec<&PracticeItem> = owned.iter().collect();
        let mut rng = SmallRng::seed_from_u64(99);
        let mut scheduler = SpawnScheduler::new(
            SpawnPolicy::Weighted {
                bootstrap_spawns: 0,
                rescue_miss_threshold: 3,
                rescue_grant_cap: 0,
            },
            "easy",
        );
        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..2_000 {
            let pick = scheduler.select_next_item(&unlocked, 0, &mut rng).unwrap();
            *counts.entry(pick.item.id.clone()).or_default() += 1;
        }
        assert!(!counts.contains_key("easy"));
        let tier1 = counts.get("short").copied().unwrap_or(0) + counts.get("other").copied().unwrap_or(0);
        assert!(tier1 > 1_500, "tier1 drew {tier1}");
        assert!(counts.get("mid").copied().unwrap_or(0) > 0);
        assert!(counts.get("long").copied().unwrap_or(0) > 0);
    }

    #[test]
    fn weighted_avoids_immediate_repeats_within_bucket() {
        let owned = items();
        let unlocked: Vec<&PracticeItem> = owned[..3].iter().collect();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut scheduler = SpawnScheduler::new(
            SpawnPolicy::Weighted {
                bootstrap_spawns: 0,
                rescue_miss_threshold: 3,
                rescue_grant_cap: 0,
            },
            "easy",
        );
        let mut previous = String::new();
        for _ in 0..50 {
            let pick = scheduler.select_next_item(&unlocked, 0, &mut rng).unwrap();
            assert_ne!(pick.item.id, previous);
            previous = pick.item.id.clone();
        }
    }

    #[test]
    fn empty_buckets_fall_back_to_easy_item() {
        let owned = items();
        let unlocked: Vec<&PracticeItem> = owned[..1].iter().collect();
        let mut rng = SmallRng::seed_from_u64(1);
        let mut scheduler = SpawnScheduler::new(
            SpawnPolicy::Weighted {
                bootstrap_spawns: 0,
                rescue_miss_threshold: 3,
                rescue_grant_cap: 0,
            },
            "easy",
        );
        let pick = scheduler.select_next_item(&unlocked, 0, &mut rng).unwrap();
        assert_eq!(pick.item.id, "easy");
        assert_eq!(pick.reason, SpawnReason::Fallback);
    }

    #[test]
    fn fixed_mode_bypasses_all_rules() {
        let owned = items();
        let unlocked: Vec<&PracticeItem> = owned.iter().collect();
        let mut rng = SmallRng::seed_from_u64(5);
        let mut scheduler = SpawnScheduler::new(
            SpawnPolicy::Fixed {
                item_id: "mid".to_string(),
            },
            "easy",
        );
        for misses in 0..6 {
            let pick = scheduler.select_next_item(&unlocked, misses, &mut rng).unwrap();
            assert_eq!(pick.item.id, "mid");
            assert_eq!(pick.reason, SpawnReason::Fixed);
        }
    }

    #[test]
    fn misconfiguration_is_reported() {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut scheduler = SpawnScheduler::new(focus_policy(), "easy");
        assert_eq!(
            scheduler.select_next_item(&[], 0, &mut rng),
            Err(SpawnError::NothingUnlocked)
        );

        let owned = items();
        let unlocked: Vec<&PracticeItem> = owned.iter().collect();
        let mut fixed = SpawnScheduler::new(
            SpawnPolicy::Fixed {
                item_id: "missing".to_string(),
            },
            "easy",
        );
        assert_eq!(
            fixed.select_next_item(&unlocked, 0, &mut rng),
            Err(SpawnError::FixedItemUnavailable("missing".to_string()))
        );
    }
}
