//! Achievement rule table and its single-pass evaluator.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::mode::GameMode;

/// What a rule checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AchievementPredicate {
    Streak { days: u32 },
    LifetimePoints { points: u64 },
    SessionPoints { points: u64 },
    LifetimeDuration { secs: u64 },
    SessionDuration { secs: u64 },
    UnlockedItemCount { count: usize },
    ItemTapCount { item_id: String, taps: u64 },
    ItemUnlocked { item_id: String },
    /// Every other evaluable achievement is unlocked.
    AllOtherAchievements,
    /// Needs the device clock context of the session.
    TimeOfDaySession { start_hour: u8, end_hour: u8 },
    /// Needs the device ringer state.
    DeviceSilentMode,
    /// Needs per-category weekly history.
    WeeklyCategoryUsage { category: String, days: u32 },
}

impl AchievementPredicate {
    /// Whether the engine has the inputs to evaluate this kind.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        match self {
            Self::TimeOfDaySession { .. }
            | Self::DeviceSilentMode
            | Self::WeeklyCategoryUsage { .. } => false,
            Self::Streak { .. }
            | Self::LifetimePoints { .. }
            | Self::SessionPoints { .. }
            | Self::LifetimeDuration { .. }
            | Self::SessionDuration { .. }
            | Self::UnlockedItemCount { .. }
            | Self::ItemTapCount { .. }
            | Self::ItemUnlocked { .. }
            | Self::AllOtherAchievements => true,
        }
    }

    const fn is_meta(&self) -> bool {
        matches!(self, Self::AllOtherAchievements)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementRule {
    pub id: String,
    #[serde(flatten)]
    pub predicate: AchievementPredicate,
}

/// Profile-wide totals after the session has been folded in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifetimeCounters {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_points: u64,
    pub total_practice_secs: u64,
    pub unlocked_item_ids: BTreeSet<String>,
    pub per_item_taps: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub mode: GameMode,
    pub points: u64,
    pub duration_secs: u64,
    pub tap_count: u64,
}

/// Ids of rules that newly hold, in rule-table order.
///
/// Ids in `already_unlocked` are never returned. Unsupported kinds never
/// match.
#[must_use]
pub fn evaluate(
    rules: &[AchievementRule],
    lifetime: &LifetimeCounters,
    session: &SessionCounters,
    already_unlocked: &BTreeSet<String>,
) -> Vec<String> {
    let mut unlocked = Vec::new();
    for rule in rules {
        if already_unlocked.contains(&rule.id) || rule.predicate.is_meta() {
            continue;
        }
        if predicate_holds(&rule.predicate, lifetime, session) {
            unlocked.push(rule.id.clone());
        }
    }

    let earned = |id: &String| already_unlocked.contains(id) || unlocked.contains(id);
    let others_done = rules
        .iter()
        .filter(|rule| rule.predicate.is_supported() && !rule.predicate.is_meta())
        .all(|rule| earned(&rule.id));
    let meta: Vec<String> = rules
        .iter()
        .filter(|rule| rule.predicate.is_meta() && !already_unlocked.contains(&rule.id))
        .filter(|_| others_done)
        .map(|rule| rule.id.clone())
        .collect();

    for id in meta {
        if !unlocked.contains(&id) {
            log::info!("achievement {id} unlocked");
            unlocked.push(id);
        }
    }
    unlocked
}

fn predicate_holds(
    predicate: &AchievementPredicate,
    lifetime: &LifetimeCounters,
    session: &SessionCounters,
) -> bool {
    match predicate {
        AchievementPredicate::Streak { days } => lifetime.current_streak >= *days,
        AchievementPredicate::LifetimePoints { points } => lifetime.total_points >= *points,
        AchievementPredicate::SessionPoints { points } => session.points >= *points,
        AchievementPredicate::LifetimeDuration { secs } => lifetime.total_practice_secs >= *secs,
        AchievementPredicate::SessionDuration { secs } => session.duration_secs >= *secs,
        AchievementPredicate::UnlockedItemCount { count } => {
            lifetime.unlocked_item_ids.len() >= *count
        }
        AchievementPredicate::ItemTapCount { item_id, taps } => {
            lifetime.per_item_taps.get(item_id).copied().unwrap_or(0) >= *taps
        }
        AchievementPredicate::ItemUnlocked { item_id } => {
            lifetime.unlocked_item_ids.contains(item_id)
        }
        AchievementPredicate::AllOtherAchievements => false,
        AchievementPredicate::TimeOfDaySession { .. }
        | AchievementPredicate::DeviceSilentMode
        | AchievementPredicate::WeeklyCategoryUsage { .. } => {
            log::debug!("achievement kind {predicate:?} is not evaluated");
            false
        }
    }
}
