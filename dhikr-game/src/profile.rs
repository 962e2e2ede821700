//! Profile record shape, merge patches and the profile-store contract.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::convert::Infallible;
use std::rc::Rc;

use crate::streak::StreakRecord;

/// Per-day activity totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub taps: u64,
    pub points: u64,
    /// Practice seconds.
    pub time: u64,
}

impl DailyStat {
    pub fn absorb(&mut self, other: Self) {
        self.taps = self.taps.saturating_add(other.taps);
        self.points = self.points.saturating_add(other.points);
        self.time = self.time.saturating_add(other.time);
    }
}

/// Fields of a user document that the engine reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileRecord {
    pub display_name: Option<String>,
    pub total_points: u64,
    pub unlocked_item_ids: BTreeSet<String>,
    /// Seconds.
    pub total_practice_time: u64,
    pub achievements: BTreeSet<String>,
    pub sessions_completed: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_played_date: Option<NaiveDate>,
    pub per_item_tap_counts: BTreeMap<String, u64>,
    pub daily_points_today: u64,
    pub active_freeze_dates: BTreeSet<NaiveDate>,
    pub daily_stats: BTreeMap<NaiveDate, DailyStat>,
}

impl ProfileRecord {
    #[must_use]
    pub fn streak_record(&self) -> StreakRecord {
        StreakRecord {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_played_date: self.last_played_date,
            active_freeze_dates: self.active_freeze_dates.clone(),
            lifetime_points: self.total_points,
        }
    }

    /// Points recorded for `today`; stale `daily_points_today` values from an
    /// earlier day read as zero.
    #[must_use]
    pub fn points_on(&self, today: NaiveDate) -> u64 {
        self.daily_stats.get(&today).map_or(0, |stat| stat.points)
    }
}

/// Partial update with merge semantics: `None` leaves a field untouched and
/// map fields merge key by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_points: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_item_ids: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_practice_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions_completed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longest_streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_played_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_item_tap_counts: Option<BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_points_today: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_freeze_dates: Option<BTreeSet<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_stats: Option<BTreeMap<NaiveDate, DailyStat>>,
}

impl ProfilePatch {
    /// Patch carrying the streak fields of `record`.
    #[must_use]
    pub fn from_streak(record: &StreakRecord) -> Self {
        Self {
            current_streak: Some(record.current_streak),
            longest_streak: Some(record.longest_streak),
            last_played_date: record.last_played_date,
            active_freeze_dates: Some(record.active_freeze_dates.clone()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, record: &mut ProfileRecord) {
        if let Some(name) = &self.display_name {
            record.display_name = Some(name.clone());
        }
        if let Some(points) = self.total_points {
            record.total_points = points;
        }
        if let Some(ids) = &self.unlocked_item_ids {
            record.unlocked_item_ids.clone_from(ids);
        }
        if let Some(time) = self.total_practice_time {
            record.total_practice_time = time;
        }
        if let Some(achievements) = &self.achievements {
            record.achievements.clone_from(achievements);
        }
        if let Some(sessions) = self.sessions_completed {
            record.sessions_completed = sessions;
        }
        if let Some(streak) = self.current_streak {
            record.current_streak = streak;
        }
        if let Some(longest) = self.longest_streak {
            record.longest_streak = longest;
        }
        if let Some(date) = self.last_played_date {
            record.last_played_date = Some(date);
        }
        if let Some(counts) = &self.per_item_tap_counts {
            record
                .per_item_tap_counts
                .extend(counts.iter().map(|(id, taps)| (id.clone(), *taps)));
        }
        if let Some(points) = self.daily_points_today {
            record.daily_points_today = points;
        }
        if let Some(dates) = &self.active_freeze_dates {
            record.active_freeze_dates.clone_from(dates);
        }
        if let Some(stats) = &self.daily_stats {
            record.daily_stats.extend(stats.iter().map(|(day, stat)| (*day, *stat)));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based.
    pub rank: usize,
    pub user_id: String,
    pub display_name: Option<String>,
    pub total_points: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub top: Vec<LeaderboardEntry>,
    /// The caller's own entry when it falls outside `top`.
    pub own: Option<LeaderboardEntry>,
}

/// External user-record store.
pub trait ProfileStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch a profile; `Ok(None)` when the user has none yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRecord>, Self::Error>;

    /// Merge `patch` into the stored profile, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<(), Self::Error>;

    /// Top `n` users by points plus the caller's own rank context.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn leaderboard_top(&self, n: usize, user_id: Option<&str>)
    -> Result<Leaderboard, Self::Error>;
}

/// Rank by total points, ties broken by user id.
#[must_use]
pub fn rank_profiles<'a, I>(profiles: I, n: usize, user_id: Option<&str>) -> Leaderboard
where
    I: IntoIterator<Item = (&'a str, &'a ProfileRecord)>,
{
    let mut ranked: Vec<(&str, &ProfileRecord)> = profiles.into_iter().collect();
    ranked.sort_by(|(a_id, a), (b_id, b)| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a_id.cmp(b_id))
    });
    let entries = ranked
        .into_iter()
        .enumerate()
        .map(|(index, (id, profile))| LeaderboardEntry {
            rank: index + 1,
            user_id: id.to_string(),
            display_name: profile.display_name.clone(),
            total_points: profile.total_points,
        });

    let mut board = Leaderboard::default();
    for entry in entries {
        if entry.rank <= n {
            board.top.push(entry);
        } else if user_id == Some(entry.user_id.as_str()) {
            board.own = Some(entry);
            break;
        } else if user_id.is_none() {
            break;
        }
    }
    board
}

/// In-process store; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Rc<RefCell<HashMap<String, ProfileRecord>>>,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn snapshot(&self, user_id: &str) -> Option<ProfileRecord> {
        self.profiles.borrow().get(user_id).cloned()
    }

    pub fn insert(&self, user_id: &str, profile: ProfileRecord) {
        self.profiles
            .borrow_mut()
            .insert(user_id.to_string(), profile);
    }
}

impl ProfileStore for MemoryProfileStore {
    type Error = Infallible;

    fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRecord>, Self::Error> {
        Ok(self.snapshot(user_id))
    }

    fn set_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<(), Self::Error> {
        let mut profiles = self.profiles.borrow_mut();
        let record = profiles.entry(user_id.to_string()).or_default();
        patch.apply_to(record);
        Ok(())
    }

    fn leaderboard_top(
        &self,
        n: usize,
        user_id: Option<&str>,
    ) -> Result<Leaderboard, Self::Error> {
        let profiles = self.profiles.borrow();
        Ok(rank_profiles(
            profiles.iter().map(|(id, profile)| (id.as_str(), profile)),
            n,
            user_id,
        ))
    }
}
