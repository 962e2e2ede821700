//! Daily streak ledger with freeze tokens.
//!
//! Freeze tokens are earned from lifetime points and spent by inserting
//! freeze dates; a scheduled or auto-consumed freeze date keeps a missed day
//! from breaking the streak.
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::constants::{MAX_FREEZE_TOKENS, POINTS_PER_FREEZE_TOKEN};

/// Persisted streak fields of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_played_date: Option<NaiveDate>,
    #[serde(default)]
    pub active_freeze_dates: BTreeSet<NaiveDate>,
    pub lifetime_points: u64,
}

/// How the streak moved on an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StreakOutcome {
    /// First recorded play.
    Started,
    /// Played the day after the last play.
    Continued,
    /// Missed days were covered by freeze dates; `frozen` lists the dates
    /// consumed by this update (empty when all were pre-scheduled).
    Preserved { frozen: Vec<NaiveDate> },
    /// Not enough tokens; the streak restarts at 1.
    Broken { missed_days: u64 },
}

/// Result of [`advance`]. `Unchanged` tells the caller to skip the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreakUpdate {
    Unchanged,
    Updated {
        record: StreakRecord,
        outcome: StreakOutcome,
    },
}

impl StreakUpdate {
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FreezeError {
    #[error("freeze date {date} is not after {today}")]
    NotInFuture { date: NaiveDate, today: NaiveDate },
    #[error("freeze date {0} is already scheduled")]
    AlreadyScheduled(NaiveDate),
    #[error("no freeze tokens remaining")]
    NoTokensRemaining,
}

/// Tokens earned from lifetime points: one per 30 000, capped at 10.
#[must_use]
pub fn available_tokens(total_points: u64) -> u32 {
    let earned = total_points / POINTS_PER_FREEZE_TOKEN;
    u32::try_from(earned)
        .unwrap_or(u32::MAX)
        .min(MAX_FREEZE_TOKENS)
}

/// Tokens not yet spent on freeze dates.
#[must_use]
pub fn remaining_tokens(record: &StreakRecord) -> u32 {
    let spent = u32::try_from(record.active_freeze_dates.len()).unwrap_or(u32::MAX);
    available_tokens(record.lifetime_points).saturating_sub(spent)
}

/// Credit a play on `today`.
///
/// Runs at most once per calendar day; a second call on the same day (or a
/// `today` before the last play) returns [`StreakUpdate::Unchanged`].
#[must_use]
pub fn advance(record: &StreakRecord, today: NaiveDate) -> StreakUpdate {
    let Some(last) = record.last_played_date else {
        log::info!("streak started on {today}");
        return updated(record, today, 1, StreakOutcome::Started, BTreeSet::new());
    };

    let day_delta = (today - last).num_days();
    match day_delta {
        0 => StreakUpdate::Unchanged,
        delta if delta < 0 => {
            log::warn!("last play {last} is after {today}; streak left unchanged");
            StreakUpdate::Unchanged
        }
        1 => {
            let streak = record.current_streak.saturating_add(1);
            log::info!("streak continued to {streak}");
            updated(record, today, streak, StreakOutcome::Continued, BTreeSet::new())
        }
        _ => {
            let uncovered: Vec<NaiveDate> = last
                .iter_days()
                .skip(1)
                .take_while(|day| *day < today)
                .filter(|day| !record.active_freeze_dates.contains(day))
                .collect();
            let remaining = usize::try_from(remaining_tokens(record)).unwrap_or(usize::MAX);
            if uncovered.len() <= remaining {
                let streak = record.current_streak.saturating_add(1);
                log::info!(
                    "streak preserved at {streak}; {} freeze date(s) consumed",
                    uncovered.len()
                );
                let inserted = uncovered.iter().copied().collect();
                updated(
                    record,
                    today,
                    streak,
                    StreakOutcome::Preserved { frozen: uncovered },
                    inserted,
                )
            } else {
                let missed_days = u64::try_from(day_delta - 1).unwrap_or(0);
                log::info!(
                    "streak broken after {missed_days} missed day(s) with {remaining} token(s)"
                );
                updated(
                    record,
                    today,
                    1,
                    StreakOutcome::Broken { missed_days },
                    BTreeSet::new(),
                )
            }
        }
    }
}

fn updated(
    record: &StreakRecord,
    today: NaiveDate,
    current_streak: u32,
    outcome: StreakOutcome,
    frozen: BTreeSet<NaiveDate>,
) -> StreakUpdate {
    let mut next = record.clone();
    next.current_streak = current_streak;
    next.longest_streak = record.longest_streak.max(current_streak);
    next.last_played_date = Some(today);
    next.active_freeze_dates.extend(frozen);
    StreakUpdate::Updated {
        record: next,
        outcome,
    }
}

/// Spend a token on a future day ahead of time.
///
/// # Errors
///
/// Returns `FreezeError` when `date` is not after `today`, is already
/// scheduled, or no token remains.
pub fn schedule_freeze(
    record: &StreakRecord,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<StreakRecord, FreezeError> {
    if date <= today {
        return Err(FreezeError::NotInFuture { date, today });
    }
    if record.active_freeze_dates.contains(&date) {
        return Err(FreezeError::AlreadyScheduled(date));
    }
    if remaining_tokens(record) == 0 {
        return Err(FreezeError::NoTokensRemaining);
    }
    let mut next = record.clone();
    next.active_freeze_dates.insert(date);
    log::debug!("freeze scheduled for {date}");
    Ok(next)
}

/// Convenience for callers that only know a day offset.
#[must_use]
pub fn day_after(date: NaiveDate, days: u64) -> Option<NaiveDate> {
    date.checked_add_days(Days::new(days))
}
