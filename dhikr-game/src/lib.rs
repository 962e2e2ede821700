//! Dhikr Practice Engine
//!
//! Platform-agnostic session progression engine for a gamified dhikr practice
//! app: the fixed-tick spawn/tap/miss loop, unlock thresholds, the daily streak
//! ledger with freeze tokens and the achievement evaluator. No UI, no network.

pub mod achievements;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod difficulty;
pub mod mode;
pub mod numbers;
pub mod profile;
pub mod rng;
pub mod session;
pub mod spawn;
pub mod streak;
pub mod unlock;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use thiserror::Error;

pub use achievements::{
    AchievementPredicate, AchievementRule, LifetimeCounters, SessionCounters, evaluate,
};
pub use catalog::{Catalog, CatalogError, PracticeItem, WeightClass};
pub use config::{ConfigError, SessionConfig};
pub use difficulty::{DifficultyLevel, difficulty_at};
pub use mode::{
    ConcurrencyBounds, FocusRules, GameMode, ModeRules, ModeSelection, NamesRules, SpawnPolicy,
    TasbihRules, TerminationPolicy,
};
pub use profile::{
    DailyStat, Leaderboard, LeaderboardEntry, MemoryProfileStore, ProfilePatch, ProfileRecord,
    ProfileStore, rank_profiles,
};
pub use rng::{CountingRng, SessionRng};
pub use session::{
    ActiveItemInstance, EndReason, InstanceId, SessionError, SessionEvent, SessionIntent,
    SessionLoop, SessionPhase, SessionSetup, SessionState, SessionSummary, StepOutcome,
    TapOutcome, TickOutcome,
};
pub use spawn::{SpawnError, SpawnPick, SpawnReason, SpawnScheduler};
pub use streak::{
    FreezeError, StreakOutcome, StreakRecord, StreakUpdate, advance, available_tokens,
    remaining_tokens, schedule_freeze,
};
pub use unlock::{ProgressMetric, UnlockPolicy, unlocked_ids};

/// Name passed to [`DataLoader::load_config`] for the session tuning.
pub const SESSION_CONFIG_NAME: &str = "session";

/// Trait for abstracting static content loading
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Catalog played by `mode` (Tasbih draws its item from the phrase catalog).
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or is invalid.
    fn load_catalog(&self, mode: GameMode) -> Result<Catalog, Self::Error>;

    /// Achievement rule table.
    ///
    /// # Errors
    ///
    /// Returns an error if the rules cannot be loaded.
    fn load_achievement_rules(&self) -> Result<Vec<AchievementRule>, Self::Error>;

    /// Load configuration data by name
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned;
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load {what}")]
    Load {
        what: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl EngineError {
    fn load(what: &'static str, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Load {
            what,
            source: Box::new(source),
        }
    }
}

/// A running session bound to a user profile.
#[derive(Debug)]
pub struct PracticeSession {
    pub user_id: String,
    pub session: SessionLoop,
    /// Profile as of session start, streak already applied.
    pub profile: ProfileRecord,
    /// Present when the streak moved on this start.
    pub streak: Option<StreakOutcome>,
}

/// Everything the presentation layer needs after a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub summary: SessionSummary,
    pub new_achievements: Vec<String>,
    pub streak: Option<StreakOutcome>,
    pub profile: ProfileRecord,
    /// False when the profile write failed; in-memory results stay valid.
    pub persisted: bool,
}

/// Main engine tying content, sessions and the profile store together
pub struct PracticeEngine<L, S>
where
    L: DataLoader,
    S: ProfileStore,
{
    data_loader: L,
    store: S,
}

impl<L, S> PracticeEngine<L, S>
where
    L: DataLoader,
    S: ProfileStore,
{
    pub const fn new(data_loader: L, store: S) -> Self {
        Self { data_loader, store }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Load the profile, credit today's streak and start a running session.
    ///
    /// # Errors
    ///
    /// Returns an error if content cannot be loaded or the session cannot be
    /// built. Profile-store failures are logged, never returned.
    pub fn start_session(
        &self,
        user_id: &str,
        selection: ModeSelection,
        today: NaiveDate,
        started_at: DateTime<Utc>,
        seed: u64,
    ) -> Result<PracticeSession, EngineError> {
        let mode = selection.mode();
        let catalog = self
            .data_loader
            .load_catalog(mode)
            .map_err(|err| EngineError::load("catalog", err))?;
        let config: SessionConfig = self
            .data_loader
            .load_config(SESSION_CONFIG_NAME)
            .map_err(|err| EngineError::load("session config", err))?;

        let mut profile = self.fetch_profile(user_id);
        let streak = match advance(&profile.streak_record(), today) {
            StreakUpdate::Unchanged => None,
            StreakUpdate::Updated { record, outcome } => {
                let patch = ProfilePatch::from_streak(&record);
                patch.apply_to(&mut profile);
                self.write(user_id, &patch);
                Some(outcome)
            }
        };

        let starting_progress = starting_progress(&selection, &profile, &catalog);
        let mut session = SessionLoop::new(SessionSetup {
            selection,
            catalog,
            config,
            seed,
            starting_progress,
            started_at,
        })?;
        session.start()?;

        Ok(PracticeSession {
            user_id: user_id.to_string(),
            session,
            profile,
            streak,
        })
    }

    /// End the session if still live, fold its results into the profile and
    /// persist them.
    ///
    /// A session that is still running is quit, not discarded.
    ///
    /// # Errors
    ///
    /// Returns an error only if ending the session fails.
    pub fn finish_session(
        &self,
        practice: PracticeSession,
        today: NaiveDate,
    ) -> Result<SessionReport, EngineError> {
        let PracticeSession {
            user_id,
            mut session,
            mut profile,
            streak,
        } = practice;
        if !session.phase().is_ended() {
            session.quit()?;
        }
        let summary = session.summary();
        let unlocked = match summary.mode {
            GameMode::Focus | GameMode::Names => unlocked_ids(
                session.rules().unlock_policy(),
                session.progress(),
                session.catalog(),
            ),
            GameMode::Tasbih => BTreeSet::new(),
        };
        fold_summary(&mut profile, &summary, unlocked, today);

        let rules = self.data_loader.load_achievement_rules().unwrap_or_else(|err| {
            log::warn!("achievement rules unavailable: {err}");
            Vec::new()
        });
        let lifetime = LifetimeCounters {
            current_streak: profile.current_streak,
            longest_streak: profile.longest_streak,
            total_points: profile.total_points,
            total_practice_secs: profile.total_practice_time,
            unlocked_item_ids: profile.unlocked_item_ids.clone(),
            per_item_taps: profile.per_item_tap_counts.clone(),
        };
        let counters = SessionCounters {
            mode: summary.mode,
            points: summary.score,
            duration_secs: summary.duration_secs(),
            tap_count: summary.tap_count,
        };
        let new_achievements = evaluate(&rules, &lifetime, &counters, &profile.achievements);
        profile.achievements.extend(new_achievements.iter().cloned());

        // Streak fields are rewritten in case the start-of-session write failed.
        let patch = ProfilePatch {
            total_points: Some(profile.total_points),
            unlocked_item_ids: Some(profile.unlocked_item_ids.clone()),
            total_practice_time: Some(profile.total_practice_time),
            achievements: Some(profile.achievements.clone()),
            sessions_completed: Some(profile.sessions_completed),
            per_item_tap_counts: Some(profile.per_item_tap_counts.clone()),
            daily_points_today: Some(profile.daily_points_today),
            daily_stats: profile
                .daily_stats
                .get(&today)
                .map(|stat| [(today, *stat)].into()),
            ..ProfilePatch::from_streak(&profile.streak_record())
        };
        let persisted = self.write(&user_id, &patch);

        Ok(SessionReport {
            summary,
            new_achievements,
            streak,
            profile,
            persisted,
        })
    }

    /// Top `n` users plus the caller's own rank when outside the top.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the leaderboard cannot be read.
    pub fn leaderboard(&self, n: usize, user_id: Option<&str>) -> Result<Leaderboard, S::Error> {
        self.store.leaderboard_top(n, user_id)
    }

    fn fetch_profile(&self, user_id: &str) -> ProfileRecord {
        match self.store.get_profile(user_id) {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                log::info!("no profile for {user_id}; starting fresh");
                ProfileRecord::default()
            }
            Err(err) => {
                log::warn!("profile read for {user_id} failed: {err}; using defaults");
                ProfileRecord::default()
            }
        }
    }

    fn write(&self, user_id: &str, patch: &ProfilePatch) -> bool {
        match self.store.set_profile(user_id, patch) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("profile write for {user_id} failed: {err}; continuing");
                false
            }
        }
    }
}

fn starting_progress(selection: &ModeSelection, profile: &ProfileRecord, catalog: &Catalog) -> u64 {
    match selection {
        ModeSelection::Focus => profile.total_points,
        ModeSelection::Names => catalog
            .items()
            .iter()
            .filter_map(|item| profile.per_item_tap_counts.get(&item.id))
            .sum(),
        ModeSelection::Tasbih { .. } => 0,
    }
}

fn fold_summary(
    profile: &mut ProfileRecord,
    summary: &SessionSummary,
    unlocked: BTreeSet<String>,
    today: NaiveDate,
) {
    profile.total_points = profile.total_points.saturating_add(summary.score);
    profile.total_practice_time = profile
        .total_practice_time
        .saturating_add(summary.duration_secs());
    profile.sessions_completed = profile.sessions_completed.saturating_add(1);
    for (item_id, taps) in &summary.per_item_taps {
        let count = profile
            .per_item_tap_counts
            .entry(item_id.clone())
            .or_default();
        *count = count.saturating_add(*taps);
    }
    profile.unlocked_item_ids.extend(unlocked);
    profile
        .daily_stats
        .entry(today)
        .or_default()
        .absorb(DailyStat {
            taps: summary.tap_count,
            points: summary.score,
            time: summary.duration_secs(),
        });
    profile.daily_points_today = profile.points_on(today);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::convert::Infallible;
    use std::io;

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl DataLoader for FixtureLoader {
        type Error = Infallible;

        fn load_catalog(&self, _mode: GameMode) -> Result<Catalog, Self::Error> {
            let items = vec![
                PracticeItem::new("easy", "SubhanAllah", 10, 0),
                PracticeItem::new("hamd", "Alhamdulillah", 10, 0),
                PracticeItem::new("takbir", "Allahu Akbar", 10, 0),
                PracticeItem::new("tahlil", "La ilaha illallah", 20, 100),
            ];
            Ok(Catalog::new("easy", items).unwrap())
        }

        fn load_achievement_rules(&self) -> Result<Vec<AchievementRule>, Self::Error> {
            Ok(vec![AchievementRule {
                id: "first_session".to_string(),
                predicate: AchievementPredicate::LifetimePoints { points: 0 },
            }])
        }

        fn load_config<T>(&self, _config_name: &str) -> Result<T, Self::Error>
        where
            T: DeserializeOwned,
        {
            Ok(serde_json::from_str("{}").unwrap())
        }
    }

    struct FailingStore;

    impl ProfileStore for FailingStore {
        type Error = io::Error;

        fn get_profile(&self, _user_id: &str) -> Result<Option<ProfileRecord>, Self::Error> {
            Err(io::Error::other("offline"))
        }

        fn set_profile(&self, _user_id: &str, _patch: &ProfilePatch) -> Result<(), Self::Error> {
            Err(io::Error::other("offline"))
        }

        fn leaderboard_top(
            &self,
            _n: usize,
            _user_id: Option<&str>,
        ) -> Result<Leaderboard, Self::Error> {
            Err(io::Error::other("offline"))
        }
    }

    /// Memory store that rejects the next `fail_next` writes.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryProfileStore,
        fail_next: Cell<usize>,
    }

    impl ProfileStore for FlakyStore {
        type Error = io::Error;

        fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRecord>, Self::Error> {
            Ok(self.inner.snapshot(user_id))
        }

        fn set_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<(), Self::Error> {
            let pending = self.fail_next.get();
            if pending > 0 {
                self.fail_next.set(pending - 1);
                return Err(io::Error::other("write timed out"));
            }
            self.inner
                .set_profile(user_id, patch)
                .map_err(|never| match never {})
        }

        fn leaderboard_top(
            &self,
            n: usize,
            user_id: Option<&str>,
        ) -> Result<Leaderboard, Self::Error> {
            self.inner
                .leaderboard_top(n, user_id)
                .map_err(|never| match never {})
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn quit_session_is_folded_into_profile() {
        let engine = PracticeEngine::new(FixtureLoader, MemoryProfileStore::default());
        let mut practice = engine
            .start_session("amina", ModeSelection::Focus, day(1), Utc::now(), 0xABCD)
            .unwrap();
        assert_eq!(practice.streak, Some(StreakOutcome::Started));
        for _ in 0..20 {
            practice.session.tick().unwrap();
        }
        let instance = practice.session.active_items()[0].instance_id;
        practice.session.tap(instance).unwrap();

        let report = engine.finish_session(practice, day(1)).unwrap();
        assert_eq!(report.summary.end_reason, Some(EndReason::Quit));
        assert!(report.persisted);
        assert_eq!(report.new_achievements, vec!["first_session"]);

        let stored = engine.store().snapshot("amina").unwrap();
        assert_eq!(stored.total_points, 10);
        assert_eq!(stored.sessions_completed, 1);
        assert_eq!(stored.current_streak, 1);
        assert_eq!(stored.daily_points_today, 10);
        assert_eq!(stored.per_item_tap_counts.get("easy"), Some(&1));
        assert!(stored.unlocked_item_ids.contains("hamd"));
        assert!(stored.achievements.contains("first_session"));
    }

    #[test]
    fn second_start_on_same_day_leaves_streak() {
        let engine = PracticeEngine::new(FixtureLoader, MemoryProfileStore::default());
        let first = engine
            .start_session("u", ModeSelection::Focus, day(1), Utc::now(), 1)
            .unwrap();
        engine.finish_session(first, day(1)).unwrap();
        let second = engine
            .start_session("u", ModeSelection::Focus, day(1), Utc::now(), 2)
            .unwrap();
        assert_eq!(second.streak, None);
        let third = engine
            .start_session("u", ModeSelection::Focus, day(2), Utc::now(), 3)
            .unwrap();
        assert_eq!(third.streak, Some(StreakOutcome::Continued));
        assert_eq!(third.profile.current_streak, 2);
    }

    #[test]
    fn store_failures_do_not_block_play() {
        let engine = PracticeEngine::new(FixtureLoader, FailingStore);
        let mut practice = engine
            .start_session("x", ModeSelection::Focus, day(3), Utc::now(), 9)
            .unwrap();
        practice.session.tick().unwrap();
        let report = engine.finish_session(practice, day(3)).unwrap();
        assert!(!report.persisted);
        assert_eq!(report.profile.sessions_completed, 1);
        assert!(engine.leaderboard(5, None).is_err());
    }

    #[test]
    fn failed_streak_write_is_saved_at_session_end() {
        let engine = PracticeEngine::new(FixtureLoader, FlakyStore::default());
        let first = engine
            .start_session("u", ModeSelection::Focus, day(1), Utc::now(), 1)
            .unwrap();
        engine.finish_session(first, day(1)).unwrap();

        engine.store().fail_next.set(1);
        let second = engine
            .start_session("u", ModeSelection::Focus, day(2), Utc::now(), 2)
            .unwrap();
        assert_eq!(second.streak, Some(StreakOutcome::Continued));
        assert_eq!(engine.store().inner.snapshot("u").unwrap().current_streak, 1);
        let report = engine.finish_session(second, day(2)).unwrap();
        assert!(report.persisted);

        let stored = engine.store().inner.snapshot("u").unwrap();
        assert_eq!(stored.current_streak, 2);
        assert_eq!(stored.last_played_date, Some(day(2)));

        let third = engine
            .start_session("u", ModeSelection::Focus, day(3), Utc::now(), 3)
            .unwrap();
        assert_eq!(third.streak, Some(StreakOutcome::Continued));
        assert_eq!(third.profile.current_streak, 3);
    }

    #[test]
    fn tasbih_rejects_unknown_item() {
        let engine = PracticeEngine::new(FixtureLoader, MemoryProfileStore::default());
        let err = engine
            .start_session(
                "u",
                ModeSelection::Tasbih {
                    item_id: "nope".to_string(),
                    target: 33,
                },
                day(1),
                Utc::now(),
                1,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Session(SessionError::UnknownItem(_))
        ));
    }
}
