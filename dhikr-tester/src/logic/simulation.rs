use anyhow::{Context, Result};
use chrono::NaiveDate;
use dhikr_game::streak::day_after;
use dhikr_game::{
    DataLoader, MemoryProfileStore, ModeSelection, PracticeEngine, ProfileRecord, SessionEvent,
    SessionIntent, SessionLoop, SessionSetup, SessionSummary, SpawnReason, StreakOutcome,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

use super::assets::TesterAssets;
use super::policy::PlayerStrategy;

const CALENDAR_USER: &str = "qa-player";
const CALENDAR_SKIP_CHANCE: f64 = 0.25;
const CALENDAR_SESSION_STEPS: usize = 600;

/// Pause the loop at `at_step` for `steps` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PauseWindow {
    pub at_step: usize,
    pub steps: usize,
}

/// Declarative plan for one scripted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPlan {
    pub selection: ModeSelection,
    pub strategy: PlayerStrategy,
    pub max_steps: usize,
    pub starting_progress: u64,
    pub pause: Option<PauseWindow>,
}

impl SessionPlan {
    #[must_use]
    pub const fn new(selection: ModeSelection, strategy: PlayerStrategy) -> Self {
        Self {
            selection,
            strategy,
            max_steps: 20_000,
            starting_progress: 0,
            pause: None,
        }
    }

    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    #[must_use]
    pub const fn with_pause(mut self, at_step: usize, steps: usize) -> Self {
        self.pause = Some(PauseWindow { at_step, steps });
        self
    }
}

/// What happened during a scripted session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRun {
    pub seed: u64,
    pub strategy: PlayerStrategy,
    pub summary: SessionSummary,
    pub steps: usize,
    pub ticked_steps: usize,
    /// Ticks the loop accepted while paused; must stay zero.
    pub paused_ticks: usize,
    pub tick_ms: u32,
    pub spawns: Vec<(String, SpawnReason)>,
    /// `consecutive_misses` value carried by each miss event.
    pub miss_streaks: Vec<u32>,
    pub unlock_events: Vec<String>,
    pub easy_item: String,
    pub catalog_size: usize,
}

/// Plan for a multi-day run through the engine facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarPlan {
    pub start: NaiveDate,
    pub days: u32,
    pub strategy: PlayerStrategy,
    pub starting_points: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub played: bool,
    pub streak: Option<StreakOutcome>,
    pub replay_streak: Option<StreakOutcome>,
    pub score: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub persisted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarRun {
    pub seed: u64,
    pub days: Vec<CalendarDay>,
    pub profile: ProfileRecord,
}

/// Drive one session step by step through the intent queue.
pub fn run_session(assets: &TesterAssets, plan: &SessionPlan, seed: u64) -> Result<SessionRun> {
    let catalog = assets
        .load_catalog(plan.selection.mode())
        .context("loading catalog")?;
    let config = assets.session_config().context("loading session config")?;
    let tick_ms = config.tick_ms;
    let easy_item = catalog.easy_item_id().to_string();
    let catalog_size = catalog.items().len();
    let mut session = SessionLoop::new(SessionSetup {
        selection: plan.selection.clone(),
        catalog,
        config,
        seed,
        starting_progress: plan.starting_progress,
        started_at: chrono::Utc::now(),
    })?;
    session.start()?;

    let mut policy = plan.strategy.create_policy(seed);
    let mut run = SessionRun {
        seed,
        strategy: plan.strategy,
        summary: session.summary(),
        steps: 0,
        ticked_steps: 0,
        paused_ticks: 0,
        tick_ms,
        spawns: Vec::new(),
        miss_streaks: Vec::new(),
        unlock_events: Vec::new(),
        easy_item,
        catalog_size,
    };

    for step in 0..plan.max_steps {
        if let Some(window) = plan.pause {
            if step == window.at_step {
                session.enqueue(SessionIntent::Pause);
            } else if step == window.at_step + window.steps {
                session.enqueue(SessionIntent::Resume);
            }
        }
        let taps: Vec<_> = session
            .active_items()
            .iter()
            .filter(|instance| policy.wants_tap(instance))
            .map(|instance| instance.instance_id)
            .collect();
        for instance in taps {
            session.enqueue(SessionIntent::Tap(instance));
        }

        let outcome = session.step()?;
        run.steps += 1;
        if outcome.ticked {
            run.ticked_steps += 1;
        } else if session.phase() == dhikr_game::SessionPhase::Paused {
            run.paused_ticks += usize::from(session.tick().is_ok());
        }
        for event in outcome.events {
            match event {
                SessionEvent::Spawned {
                    item_id, reason, ..
                } => run.spawns.push((item_id, reason)),
                SessionEvent::Missed {
                    consecutive_misses, ..
                } => run.miss_streaks.push(consecutive_misses),
                SessionEvent::Unlocked { item_id } => run.unlock_events.push(item_id),
                SessionEvent::Hit { .. } | SessionEvent::Ended { .. } => {}
            }
        }
        if session.phase().is_ended() {
            break;
        }
    }
    if !session.phase().is_ended() {
        session.quit()?;
    }
    run.summary = session.summary();
    log::debug!(
        "{} seed {seed}: {} steps, score {}, end {:?}",
        policy.name(),
        run.steps,
        run.summary.score,
        run.summary.end_reason
    );
    Ok(run)
}

/// Play a calendar of days, skipping some at random, through the engine.
pub fn run_calendar(assets: &TesterAssets, plan: &CalendarPlan, seed: u64) -> Result<CalendarRun> {
    let store = MemoryProfileStore::default();
    store.insert(
        CALENDAR_USER,
        ProfileRecord {
            total_points: plan.starting_points,
            ..ProfileRecord::default()
        },
    );
    let engine = PracticeEngine::new(assets.clone(), store);
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let session_plan = SessionPlan::new(ModeSelection::Focus, plan.strategy);
    let mut days = Vec::new();

    for offset in 0..plan.days {
        let date = day_after(plan.start, u64::from(offset)).context("calendar overflow")?;
        let played = offset == 0 || rng.r#gen::<f64>() >= CALENDAR_SKIP_CHANCE;
        if !played {
            let profile = engine.store().snapshot(CALENDAR_USER).unwrap_or_default();
            days.push(CalendarDay {
                date,
                played,
                streak: None,
                replay_streak: None,
                score: 0,
                current_streak: profile.current_streak,
                longest_streak: profile.longest_streak,
                persisted: true,
            });
            continue;
        }

        let day_seed = seed.wrapping_add(u64::from(offset));
        let started_at = date
            .and_hms_opt(7, 0, 0)
            .context("invalid session time")?
            .and_utc();
        let mut practice = engine.start_session(
            CALENDAR_USER,
            ModeSelection::Focus,
            date,
            started_at,
            day_seed,
        )?;
        let streak = practice.streak.clone();
        let mut policy = session_plan.strategy.create_policy(day_seed);
        for _ in 0..CALENDAR_SESSION_STEPS {
            let taps: Vec<_> = practice
                .session
                .active_items()
                .iter()
                .filter(|instance| policy.wants_tap(instance))
                .map(|instance| instance.instance_id)
                .collect();
            for instance in taps {
                practice.session.enqueue(SessionIntent::Tap(instance));
            }
            practice.session.step()?;
            if practice.session.phase().is_ended() {
                break;
            }
        }
        let report = engine.finish_session(practice, date)?;

        let replay = engine.start_session(
            CALENDAR_USER,
            ModeSelection::Focus,
            date,
            started_at,
            day_seed ^ 0x5A5A,
        )?;
        let replay_streak = replay.streak.clone();
        drop(replay);

        days.push(CalendarDay {
            date,
            played,
            streak,
            replay_streak,
            score: report.summary.score,
            current_streak: report.profile.current_streak,
            longest_streak: report.profile.longest_streak,
            persisted: report.persisted,
        });
    }

    let profile = engine.store().snapshot(CALENDAR_USER).unwrap_or_default();
    Ok(CalendarRun {
        seed,
        days,
        profile,
    })
}
