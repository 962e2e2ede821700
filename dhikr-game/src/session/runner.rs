//! Fixed-tick session loop.
//!
//! Each tick runs, in order: unlock check, advance, miss detection,
//! termination check, replenish. Taps are applied between ticks.
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::event::{EndReason, EventList, SessionEvent, TapOutcome, TickOutcome};
use super::{
    ActiveItemInstance, InstanceId, SessionError, SessionIntent, SessionPhase, SessionState,
    SessionSummary,
};
use crate::catalog::Catalog;
use crate::config::SessionConfig;
use crate::difficulty::{DifficultyLevel, difficulty_at};
use crate::mode::{ModeRules, ModeSelection, SpawnPolicy};
use crate::rng::SessionRng;
use crate::spawn::{SpawnReason, SpawnScheduler};
use crate::unlock::{ProgressMetric, unlocked_ids};
use rand::Rng;

/// Everything needed to start a session.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub selection: ModeSelection,
    /// Catalog for the selected mode (phrases for Focus/Tasbih, names for Names).
    pub catalog: Catalog,
    pub config: SessionConfig,
    pub seed: u64,
    /// Lifetime progress carried into the session (points or taps).
    pub starting_progress: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionLoop {
    rules: Box<dyn ModeRules>,
    catalog: Catalog,
    config: SessionConfig,
    scheduler: SpawnScheduler,
    rng: SessionRng,
    state: SessionState,
    phase: SessionPhase,
    active: Vec<ActiveItemInstance>,
    next_instance: u64,
    starting_progress: u64,
    seen_unlocked: BTreeSet<String>,
    highlight_remaining: BTreeMap<String, u8>,
    newly_unlocked: Vec<String>,
    pub(super) intents: VecDeque<SessionIntent>,
}

impl SessionLoop {
    /// Build an idle session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the configuration is invalid, the Tasbih
    /// item is unknown or its target is zero, or nothing is unlocked.
    pub fn new(setup: SessionSetup) -> Result<Self, SessionError> {
        setup.config.validate()?;
        let rules = setup.selection.rules();

        let catalog = match &setup.selection {
            ModeSelection::Tasbih { item_id, target } => {
                if *target == 0 {
                    return Err(SessionError::ZeroTarget);
                }
                let item = setup
                    .catalog
                    .get(item_id)
                    .cloned()
                    .ok_or_else(|| SessionError::UnknownItem(item_id.clone()))?;
                Catalog::new(item_id, vec![item])?
            }
            ModeSelection::Focus | ModeSelection::Names => setup.catalog,
        };

        let seen_unlocked = unlocked_ids(rules.unlock_policy(), setup.starting_progress, &catalog);
        if seen_unlocked.is_empty() {
            return Err(SessionError::NothingUnlocked);
        }

        let scheduler = SpawnScheduler::new(rules.spawn_policy(), catalog.easy_item_id());
        let state = SessionState::new(
            rules.mode(),
            setup.config.starting_lives,
            setup.started_at,
        );
        Ok(Self {
            rules,
            catalog,
            config: setup.config,
            scheduler,
            rng: SessionRng::from_user_seed(setup.seed),
            state,
            phase: SessionPhase::Idle,
            active: Vec::new(),
            next_instance: 1,
            starting_progress: setup.starting_progress,
            seen_unlocked,
            highlight_remaining: BTreeMap::new(),
            newly_unlocked: Vec::new(),
            intents: VecDeque::new(),
        })
    }

    /// Idle → Running.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is idle.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                action: "start",
            });
        }
        self.scheduler.reset();
        self.phase = SessionPhase::Running;
        log::info!(
            "session started: mode={} progress={} unlocked={}",
            self.state.mode,
            self.starting_progress,
            self.seen_unlocked.len()
        );
        Ok(())
    }

    /// Running → Paused. Paused time does not count toward the ramp.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is running.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Running {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                action: "pause",
            });
        }
        self.phase = SessionPhase::Paused;
        Ok(())
    }

    /// Paused → Running.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is paused.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Paused {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                action: "resume",
            });
        }
        self.phase = SessionPhase::Running;
        Ok(())
    }

    /// End early, keeping every counter.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` when the session already ended.
    pub fn quit(&mut self) -> Result<(), SessionError> {
        if self.phase.is_ended() {
            return Err(SessionError::InvalidTransition {
                from: self.phase,
                action: "quit",
            });
        }
        let mut events = EventList::new();
        self.finish(EndReason::Quit, &mut events);
        Ok(())
    }

    /// Advance one fixed time quantum.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotRunning` when the session is idle, paused or ended,
    /// and `SessionError::Spawn` when the scheduler has nothing it may spawn.
    pub fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        if !self.phase.is_running() {
            return Err(SessionError::NotRunning(self.phase));
        }
        let mut events = EventList::new();
        self.state.ticks += 1;
        self.state.elapsed_ms += u64::from(self.config.tick_ms);

        self.check_unlocks(&mut events);

        let level = self.difficulty();
        for instance in &mut self.active {
            instance.travel_progress += level.speed_per_tick;
        }

        self.detect_misses(&mut events);

        if !self.phase.is_ended() {
            self.check_termination(&mut events);
        }

        if !self.phase.is_ended() {
            self.replenish(level.target_concurrency, &mut events)?;
        }

        let ended = match self.phase {
            SessionPhase::Ended(reason) => Some(reason),
            _ => None,
        };
        Ok(TickOutcome { events, ended })
    }

    /// Apply a tap on an instance.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotRunning` when the session is not running.
    /// A tap on an instance that no longer exists is `TapOutcome::Ignored`.
    pub fn tap(&mut self, instance: InstanceId) -> Result<TapOutcome, SessionError> {
        if !self.phase.is_running() {
            return Err(SessionError::NotRunning(self.phase));
        }
        let Some(pos) = self
            .active
            .iter()
            .position(|active| active.instance_id == instance)
        else {
            log::debug!("tap on {instance} ignored; instance already gone");
            return Ok(TapOutcome::Ignored);
        };
        let tapped = self.active.remove(pos);
        let points = self
            .catalog
            .get(&tapped.item_id)
            .map_or(0, |item| self.rules.score_on_tap(item));

        self.state.score += u64::from(points);
        self.state.tap_count += 1;
        self.state.consecutive_misses = 0;
        *self
            .state
            .per_item_taps
            .entry(tapped.item_id.clone())
            .or_default() += 1;

        let mut events = EventList::new();
        events.push(SessionEvent::Hit {
            instance,
            item_id: tapped.item_id,
            points,
        });

        if self.rules.progress_metric() == ProgressMetric::Taps {
            self.check_unlocks(&mut events);
        }
        if self.target_reached() {
            self.finish(EndReason::TargetReached, &mut events);
        }
        Ok(TapOutcome::Hit { points, events })
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn active_items(&self) -> &[ActiveItemInstance] {
        &self.active
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn rules(&self) -> &dyn ModeRules {
        self.rules.as_ref()
    }

    /// Current value of the mode's progress metric, including this session.
    #[must_use]
    pub fn progress(&self) -> u64 {
        let session = match self.rules.progress_metric() {
            ProgressMetric::Points => self.state.score,
            ProgressMetric::Taps => self.state.tap_count,
        };
        self.starting_progress.saturating_add(session)
    }

    #[must_use]
    pub fn difficulty(&self) -> DifficultyLevel {
        difficulty_at(&self.config, self.state.elapsed_ms, self.rules.concurrency())
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            mode: self.state.mode,
            score: self.state.score,
            tap_count: self.state.tap_count,
            miss_count: self.state.miss_count,
            lives_remaining: self.state.lives,
            items_seen: self.state.items_seen_count,
            elapsed_ms: self.state.elapsed_ms,
            started_at: self.state.started_at,
            per_item_taps: self.state.per_item_taps.clone(),
            newly_unlocked: self.newly_unlocked.clone(),
            rescues_granted: self.scheduler.rescues_granted(),
            rng_draws: self.rng.spawn.draws() + self.rng.lane.draws(),
            end_reason: match self.phase {
                SessionPhase::Ended(reason) => Some(reason),
                _ => None,
            },
        }
    }

    fn check_unlocks(&mut self, events: &mut EventList) {
        let current = unlocked_ids(self.rules.unlock_policy(), self.progress(), &self.catalog);
        let fresh: Vec<String> = self
            .catalog
            .items()
            .iter()
            .filter(|item| current.contains(&item.id) && !self.seen_unlocked.contains(&item.id))
            .map(|item| item.id.clone())
            .collect();
        for item_id in fresh {
            log::info!("unlocked {item_id} at progress {}", self.progress());
            self.seen_unlocked.insert(item_id.clone());
            self.highlight_remaining
                .insert(item_id.clone(), self.config.highlight_spawns);
            self.newly_unlocked.push(item_id.clone());
            events.push(SessionEvent::Unlocked {
                item_id: item_id.clone(),
            });
            self.scheduler.record_spawn(&item_id);
            self.push_instance(item_id, SpawnReason::NewlyUnlocked, true, events);
        }
    }

    fn detect_misses(&mut self, events: &mut EventList) {
        let bound = self.config.travel_end;
        let termination = self.rules.termination_policy();
        let (missed, kept): (Vec<_>, Vec<_>) = self
            .active
            .drain(..)
            .partition(|instance| instance.travel_progress > bound);
        self.active = kept;

        for instance in missed {
            self.state.miss_count += 1;
            self.state.consecutive_misses += 1;
            if termination.uses_lives {
                self.state.lives = self.state.lives.saturating_sub(1);
            }
            log::debug!(
                "missed {} {} (consecutive {})",
                instance.instance_id,
                instance.item_id,
                self.state.consecutive_misses
            );
            events.push(SessionEvent::Missed {
                instance: instance.instance_id,
                item_id: instance.item_id,
                lives: self.state.lives,
                consecutive_misses: self.state.consecutive_misses,
            });
        }
        if self.state.consecutive_misses >= termination.consecutive_miss_cap {
            self.finish(EndReason::ConsecutiveMisses, events);
        }
    }

    fn check_termination(&mut self, events: &mut EventList) {
        let termination = self.rules.termination_policy();
        if self.state.consecutive_misses >= termination.consecutive_miss_cap {
            self.finish(EndReason::ConsecutiveMisses, events);
        } else if self.target_reached() {
            self.finish(EndReason::TargetReached, events);
        }
    }

    fn target_reached(&self) -> bool {
        self.rules
            .termination_policy()
            .target_taps
            .is_some_and(|target| self.state.tap_count >= target)
    }

    fn replenish(&mut self, target: usize, events: &mut EventList) -> Result<(), SessionError> {
        if self.active.len() < target {
            self.spawn_scheduled(events)?;
            if self.active.len() < target.saturating_sub(1) {
                self.spawn_scheduled(events)?;
            }
        }
        Ok(())
    }

    fn spawn_scheduled(&mut self, events: &mut EventList) -> Result<(), SessionError> {
        let progress = self.progress();
        let unlocked = self
            .rules
            .unlock_policy()
            .unlocked_items(progress, &self.catalog);
        let picked = self.scheduler.select_next_item(
            &unlocked,
            self.state.consecutive_misses,
            &mut self.rng.spawn,
        );
        let (item_id, reason) = match picked {
            Ok(pick) => (pick.item.id.clone(), pick.reason),
            Err(err) => {
                log::error!("spawn failed: {err}");
                return Err(err.into());
            }
        };
        let highlighted = match self.highlight_remaining.get_mut(&item_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        self.push_instance(item_id, reason, highlighted, events);
        Ok(())
    }

    fn push_instance(
        &mut self,
        item_id: String,
        reason: SpawnReason,
        newly_unlocked: bool,
        events: &mut EventList,
    ) {
        let instance = InstanceId(self.next_instance);
        self.next_instance += 1;
        let lane = self.draw_lane();
        self.state.items_seen_count += 1;
        events.push(SessionEvent::Spawned {
            instance,
            item_id: item_id.clone(),
            lane,
            newly_unlocked,
            reason,
        });
        self.active.push(ActiveItemInstance {
            instance_id: instance,
            item_id,
            travel_progress: self.config.travel_start,
            lane,
            spawned_as_newly_unlocked: newly_unlocked,
        });
    }

    fn draw_lane(&mut self) -> f32 {
        let (min, max) = (self.config.lane_min, self.config.lane_max);
        let spacing = self.config.lane_spacing;
        let mut lane = self.rng.lane.gen_range(min..max);
        for _ in 1..crate::constants::LANE_MAX_ATTEMPTS {
            let crowded = self
                .active
                .iter()
                .any(|active| (active.lane - lane).abs() < spacing);
            if !crowded {
                break;
            }
            lane = self.rng.lane.gen_range(min..max);
        }
        lane
    }

    fn finish(&mut self, reason: EndReason, events: &mut EventList) {
        if reason == EndReason::TargetReached {
            let bonus = match self.rules.spawn_policy() {
                SpawnPolicy::Fixed { item_id } => self
                    .catalog
                    .get(&item_id)
                    .map_or(0, |item| self.rules.completion_bonus(item, self.state.tap_count)),
                SpawnPolicy::Weighted { .. } => 0,
            };
            self.state.score += u64::from(bonus);
        }
        self.active.clear();
        self.phase = SessionPhase::Ended(reason);
        log::info!(
            "session ended: reason={reason} score={} taps={} misses={}",
            self.state.score,
            self.state.tap_count,
            self.state.miss_count
        );
        events.push(SessionEvent::Ended { reason });
    }
}
