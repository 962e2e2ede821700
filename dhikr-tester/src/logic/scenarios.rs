use anyhow::{Result, ensure};
use chrono::NaiveDate;
use dhikr_game::constants::{
    FOCUS_BOOTSTRAP_SPAWNS, NAMES_BASE_UNLOCKED, NAMES_POINTS_PER_TAP, NAMES_TAPS_PER_UNLOCK,
    STANDARD_MISS_CAP, STARTING_LIVES,
};
use dhikr_game::{EndReason, ModeSelection, SpawnReason, StreakOutcome, available_tokens};
use std::sync::Arc;

use super::policy::PlayerStrategy;
use super::simulation::{CalendarPlan, CalendarRun, SessionPlan, SessionRun};

const TASBIH_ITEM: &str = "subhanallah";
const TASBIH_TARGET: u64 = 33;

/// Options shared by every scenario run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub days: u32,
}

/// What a scenario executes.
#[derive(Debug, Clone)]
pub enum ScenarioPlan {
    Session(SessionPlan),
    Calendar(CalendarPlan),
}

/// Output of one scenario iteration.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Session(SessionRun),
    Calendar(CalendarRun),
}

impl RunOutcome {
    fn session(&self) -> Result<&SessionRun> {
        match self {
            Self::Session(run) => Ok(run),
            Self::Calendar(_) => anyhow::bail!("expected a session run"),
        }
    }

    fn calendar(&self) -> Result<&CalendarRun> {
        match self {
            Self::Calendar(run) => Ok(run),
            Self::Session(_) => anyhow::bail!("expected a calendar run"),
        }
    }

    /// One-line context for failure messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Session(run) => format!(
                "{} seed {} steps {} score {} taps {} misses {} end {:?}",
                run.strategy,
                run.seed,
                run.steps,
                run.summary.score,
                run.summary.tap_count,
                run.summary.miss_count,
                run.summary.end_reason
            ),
            Self::Calendar(run) => format!(
                "seed {} days {} streak {} longest {}",
                run.seed,
                run.days.len(),
                run.profile.current_streak,
                run.profile.longest_streak
            ),
        }
    }
}

type ExpectationFn = Arc<dyn Fn(&RunOutcome) -> Result<()> + Send + Sync + 'static>;

/// Assertion hook run after a scenario iteration completes.
#[derive(Clone)]
pub struct Expectation(ExpectationFn);

impl std::fmt::Debug for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expectation").finish()
    }
}

impl Expectation {
    pub fn evaluate(&self, outcome: &RunOutcome) -> Result<()> {
        (self.0)(outcome)
    }
}

impl<F> From<F> for Expectation
where
    F: Fn(&RunOutcome) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub key: &'static str,
    pub name: &'static str,
    pub plan: ScenarioPlan,
    pub expectations: Vec<Expectation>,
}

impl Scenario {
    fn new(key: &'static str, name: &'static str, plan: ScenarioPlan) -> Self {
        Self {
            key,
            name,
            plan,
            expectations: Vec::new(),
        }
    }

    fn with_expectation(mut self, expectation: impl Into<Expectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Scenario keys with a one-line description, in run order.
#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smoke", "Perfect Focus play for one minute: no misses, score grows"),
        ("bootstrap", "First Focus spawns are the easy item for any seed"),
        ("miss-termination", "Idle Focus play ends exactly at the fifth consecutive miss"),
        ("tasbih-completion", "Tasbih ends on its target with the completion bonus"),
        ("names-unlocks", "Names unlock one entry per 33 taps"),
        ("streak-calendar", "Multi-day calendar keeps streak and freeze invariants"),
        ("pause-resume", "Paused time never advances the session"),
    ]
}

#[must_use]
pub fn get_scenario(key: &str, options: RunOptions) -> Option<Scenario> {
    let scenario = match key {
        "smoke" => Scenario::new(
            "smoke",
            "Smoke",
            ScenarioPlan::Session(
                SessionPlan::new(ModeSelection::Focus, PlayerStrategy::Perfect)
                    .with_max_steps(1_200),
            ),
        )
        .with_expectation(smoke_expectation),
        "bootstrap" => Scenario::new(
            "bootstrap",
            "Bootstrap Spawns",
            ScenarioPlan::Session(
                SessionPlan::new(ModeSelection::Focus, PlayerStrategy::Sloppy).with_max_steps(200),
            ),
        )
        .with_expectation(bootstrap_expectation),
        "miss-termination" => Scenario::new(
            "miss-termination",
            "Miss Termination",
            ScenarioPlan::Session(SessionPlan::new(ModeSelection::Focus, PlayerStrategy::Idle)),
        )
        .with_expectation(miss_termination_expectation),
        "tasbih-completion" => Scenario::new(
            "tasbih-completion",
            "Tasbih Completion",
            ScenarioPlan::Session(SessionPlan::new(
                ModeSelection::Tasbih {
                    item_id: TASBIH_ITEM.to_string(),
                    target: TASBIH_TARGET,
                },
                PlayerStrategy::Perfect,
            )),
        )
        .with_expectation(tasbih_expectation),
        "names-unlocks" => Scenario::new(
            "names-unlocks",
            "Names Unlocks",
            ScenarioPlan::Session(
                SessionPlan::new(ModeSelection::Names, PlayerStrategy::Perfect)
                    .with_max_steps(3_000),
            ),
        )
        .with_expectation(names_expectation),
        "streak-calendar" => Scenario::new(
            "streak-calendar",
            "Streak Calendar",
            ScenarioPlan::Calendar(CalendarPlan {
                start: NaiveDate::from_ymd_opt(2025, 1, 1)?,
                days: options.days,
                strategy: PlayerStrategy::Sloppy,
                starting_points: 60_000,
            }),
        )
        .with_expectation(calendar_expectation),
        "pause-resume" => Scenario::new(
            "pause-resume",
            "Pause and Resume",
            ScenarioPlan::Session(
                SessionPlan::new(ModeSelection::Focus, PlayerStrategy::Perfect)
                    .with_max_steps(600)
                    .with_pause(200, 150),
            ),
        )
        .with_expectation(pause_expectation),
        _ => return None,
    };
    Some(scenario)
}

fn smoke_expectation(outcome: &RunOutcome) -> Result<()> {
    let run = outcome.session()?;
    ensure!(run.summary.miss_count == 0, "perfect play missed items");
    ensure!(run.summary.score > 0, "no score after a minute of play");
    ensure!(
        run.summary.end_reason == Some(EndReason::Quit),
        "session ended early: {:?}",
        run.summary.end_reason
    );
    ensure!(
        run.summary.items_seen >= run.summary.tap_count,
        "more taps than spawns"
    );
    Ok(())
}

fn bootstrap_expectation(outcome: &RunOutcome) -> Result<()> {
    let run = outcome.session()?;
    let bootstrap = usize::try_from(FOCUS_BOOTSTRAP_SPAWNS)?;
    ensure!(run.spawns.len() >= bootstrap, "too few spawns observed");
    for (index, (item_id, reason)) in run.spawns.iter().take(bootstrap).enumerate() {
        ensure!(
            item_id == &run.easy_item && *reason == SpawnReason::Bootstrap,
            "spawn {} was {item_id} ({reason:?})",
            index + 1
        );
    }
    ensure!(
        run.spawns
            .iter()
            .skip(bootstrap)
            .all(|(_, reason)| *reason != SpawnReason::Bootstrap),
        "bootstrap spawns exceeded {bootstrap}"
    );
    Ok(())
}

fn miss_termination_expectation(outcome: &RunOutcome) -> Result<()> {
    let run = outcome.session()?;
    ensure!(
        run.summary.end_reason == Some(EndReason::ConsecutiveMisses),
        "end reason {:?}",
        run.summary.end_reason
    );
    let expected: Vec<u32> = (1..=STANDARD_MISS_CAP).collect();
    ensure!(
        run.miss_streaks == expected,
        "miss streaks {:?}",
        run.miss_streaks
    );
    ensure!(run.summary.tap_count == 0, "idle player tapped");
    ensure!(
        run.summary.rescues_granted >= 1,
        "no rescue spawn after three misses"
    );
    Ok(())
}

fn tasbih_expectation(outcome: &RunOutcome) -> Result<()> {
    let run = outcome.session()?;
    ensure!(
        run.summary.end_reason == Some(EndReason::TargetReached),
        "end reason {:?}",
        run.summary.end_reason
    );
    ensure!(run.summary.tap_count == TASBIH_TARGET, "tap count {}", run.summary.tap_count);
    ensure!(
        run.spawns.iter().all(|(item_id, _)| item_id == TASBIH_ITEM),
        "foreign item spawned in Tasbih"
    );
    ensure!(
        run.summary.lives_remaining == STARTING_LIVES,
        "Tasbih consumed lives"
    );
    ensure!(
        run.summary.score == 10 * TASBIH_TARGET,
        "completion bonus {} != points x target",
        run.summary.score
    );
    Ok(())
}

fn names_expectation(outcome: &RunOutcome) -> Result<()> {
    let run = outcome.session()?;
    let earned = usize::try_from(run.summary.tap_count / NAMES_TAPS_PER_UNLOCK)?;
    let expected = (NAMES_BASE_UNLOCKED + earned).min(run.catalog_size) - NAMES_BASE_UNLOCKED;
    ensure!(
        run.unlock_events.len() == expected,
        "{} unlocks after {} taps, expected {expected}",
        run.unlock_events.len(),
        run.summary.tap_count
    );
    ensure!(
        run.summary.newly_unlocked == run.unlock_events,
        "summary disagrees with unlock events"
    );
    ensure!(
        run.summary.score == run.summary.tap_count * u64::from(NAMES_POINTS_PER_TAP),
        "names score is not flat per tap"
    );
    Ok(())
}

fn calendar_expectation(outcome: &RunOutcome) -> Result<()> {
    let run = outcome.calendar()?;
    let first = run.days.first().ok_or_else(|| anyhow::anyhow!("no days"))?;
    ensure!(
        first.streak == Some(StreakOutcome::Started),
        "first day {:?}",
        first.streak
    );
    let mut previous_played = false;
    for day in &run.days {
        ensure!(
            day.replay_streak.is_none(),
            "{}: second start moved the streak",
            day.date
        );
        ensure!(
            day.longest_streak >= day.current_streak,
            "{}: longest below current",
            day.date
        );
        if day.played && previous_played {
            ensure!(
                day.streak == Some(StreakOutcome::Continued),
                "{}: consecutive play gave {:?}",
                day.date,
                day.streak
            );
        }
        if let Some(StreakOutcome::Broken { .. }) = day.streak {
            ensure!(day.current_streak == 1, "{}: broken streak not reset", day.date);
        }
        previous_played = day.played;
    }
    let tokens = available_tokens(run.profile.total_points);
    let spent = u32::try_from(run.profile.active_freeze_dates.len())?;
    ensure!(spent <= tokens, "spent {spent} freeze tokens with {tokens} earned");
    let played = run.days.iter().filter(|day| day.played).count();
    ensure!(
        run.profile.sessions_completed == u64::try_from(played)?,
        "sessions {} for {played} played days",
        run.profile.sessions_completed
    );
    Ok(())
}

fn pause_expectation(outcome: &RunOutcome) -> Result<()> {
    let run = outcome.session()?;
    ensure!(run.paused_ticks == 0, "{} ticks ran while paused", run.paused_ticks);
    ensure!(
        run.summary.elapsed_ms == u64::try_from(run.ticked_steps)? * u64::from(run.tick_ms),
        "elapsed {} ms over {} ticks",
        run.summary.elapsed_ms,
        run.ticked_steps
    );
    ensure!(
        run.ticked_steps + 150 == run.steps,
        "{} ticked of {} steps",
        run.ticked_steps,
        run.steps
    );
    Ok(())
}
