mod common;

use chrono::{DateTime, Utc};
use common::{AssetLoader, tap_all};
use dhikr_game::constants::{FOCUS_BOOTSTRAP_SPAWNS, NAMES_TAPS_PER_UNLOCK};
use dhikr_game::{
    Catalog, DataLoader, EndReason, GameMode, ModeSelection, SessionConfig, SessionEvent,
    SessionLoop, SessionPhase, SessionSetup, SpawnReason, SpawnScheduler, TapOutcome,
};

fn start(selection: ModeSelection, seed: u64, starting_progress: u64) -> SessionLoop {
    let catalog = AssetLoader.load_catalog(selection.mode()).unwrap();
    let mut session = SessionLoop::new(SessionSetup {
        selection,
        catalog,
        config: SessionConfig::default(),
        seed,
        starting_progress,
        started_at: DateTime::<Utc>::UNIX_EPOCH,
    })
    .unwrap();
    session.start().unwrap();
    session
}

#[test]
fn focus_bootstrap_is_seed_independent() {
    let catalog = AssetLoader.load_catalog(GameMode::Focus).unwrap();
    let unlocked: Vec<_> = catalog.items().iter().collect();
    let policy = ModeSelection::Focus.rules().spawn_policy();
    for seed in 0..64_u64 {
        let mut scheduler = SpawnScheduler::new(policy.clone(), catalog.easy_item_id());
        let mut rng = dhikr_game::SessionRng::from_user_seed(seed);
        for _ in 0..FOCUS_BOOTSTRAP_SPAWNS {
            let pick = scheduler.select_next_item(&unlocked, 0, &mut rng.spawn).unwrap();
            assert_eq!(pick.item.id, "subhanallah", "seed {seed}");
            assert_eq!(pick.reason, SpawnReason::Bootstrap);
        }
    }
}

#[test]
fn focus_session_ends_exactly_on_fifth_consecutive_miss() {
    for seed in [1_u64, 42, 0xDEAD_BEEF] {
        let mut session = start(ModeSelection::Focus, seed, 0);
        let mut misses = Vec::new();
        let mut ended_at = None;
        while ended_at.is_none() {
            let outcome = session.tick().unwrap();
            for event in &outcome.events {
                if let SessionEvent::Missed {
                    consecutive_misses, ..
                } = event
                {
                    misses.push(*consecutive_misses);
                }
            }
            ended_at = outcome.ended;
        }
        assert_eq!(ended_at, Some(EndReason::ConsecutiveMisses));
        assert_eq!(misses, vec![1, 2, 3, 4, 5], "seed {seed}");
        assert_eq!(session.summary().miss_count, 5);
        assert!(session.tick().is_err());
    }
}

#[test]
fn focus_tap_awards_point_value_and_clears_miss_streak() {
    let mut session = start(ModeSelection::Focus, 7, 0);
    while session.state().consecutive_misses < 3 {
        session.tick().unwrap();
    }
    let target = loop {
        if let Some(active) = session.active_items().first() {
            break active.clone();
        }
        session.tick().unwrap();
    };
    let value = session.catalog().get(&target.item_id).unwrap().point_value;
    let score_before = session.state().score;

    let TapOutcome::Hit { points, .. } = session.tap(target.instance_id).unwrap() else {
        panic!("tap on a live instance must hit");
    };
    assert_eq!(points, value);
    assert_eq!(session.state().score, score_before + u64::from(value));
    assert_eq!(session.state().consecutive_misses, 0);
}

#[test]
fn names_unlock_on_the_tap_that_crosses_the_threshold() {
    let mut session = start(ModeSelection::Names, 3, 0);
    let mut unlocked_after = Vec::new();
    while session.state().tap_count < NAMES_TAPS_PER_UNLOCK {
        session.tick().unwrap();
        let ids: Vec<_> = session
            .active_items()
            .iter()
            .map(|active| active.instance_id)
            .collect();
        for id in ids {
            if session.state().tap_count >= NAMES_TAPS_PER_UNLOCK {
                break;
            }
            if let TapOutcome::Hit { events, .. } = session.tap(id).unwrap() {
                for event in events {
                    if let SessionEvent::Unlocked { item_id } = event {
                        unlocked_after.push((session.state().tap_count, item_id));
                    }
                }
            }
        }
    }
    assert_eq!(
        unlocked_after,
        vec![(NAMES_TAPS_PER_UNLOCK, "as_salam".to_string())]
    );
    assert_eq!(session.state().score, NAMES_TAPS_PER_UNLOCK * 5);
    assert!(
        session
            .active_items()
            .iter()
            .any(|active| active.item_id == "as_salam" && active.spawned_as_newly_unlocked)
    );
}

#[test]
fn names_resume_from_lifetime_taps() {
    let session = start(ModeSelection::Names, 3, 70);
    let catalog: &Catalog = session.catalog();
    let policy = session.rules().unlock_policy();
    assert_eq!(policy.unlocked_count(70, catalog), 6);
}

#[test]
fn tasbih_runs_to_target_with_single_item() {
    let mut session = start(
        ModeSelection::Tasbih {
            item_id: "allahu_akbar".to_string(),
            target: 33,
        },
        11,
        0,
    );
    while !session.phase().is_ended() {
        session.tick().unwrap();
        assert!(session.active_items().len() <= 1);
        assert!(
            session
                .active_items()
                .iter()
                .all(|active| active.item_id == "allahu_akbar")
        );
        tap_all(&mut session);
    }
    let summary = session.summary();
    assert_eq!(summary.end_reason, Some(EndReason::TargetReached));
    assert_eq!(summary.tap_count, 33);
    assert_eq!(summary.score, 330);
}

#[test]
fn perfect_play_ramps_difficulty_without_ending() {
    let mut session = start(ModeSelection::Focus, 5, 0);
    // four minutes of active play at 50 ms per tick
    for _ in 0..4_800 {
        session.tick().unwrap();
        tap_all(&mut session);
    }
    assert_eq!(session.phase(), SessionPhase::Running);
    let level = session.difficulty();
    assert!(level.speed_capped);
    assert!(level.target_concurrency > 2);
    assert_eq!(session.state().miss_count, 0);
    assert!(!session.summary().newly_unlocked.is_empty());
}

#[test]
fn identical_seeds_replay_identically() {
    let run = |seed| {
        let mut session = start(ModeSelection::Focus, seed, 2_000);
        let mut events = Vec::new();
        for tick in 0..1_500 {
            events.extend(session.tick().unwrap().events);
            if tick % 3 == 0 {
                tap_all(&mut session);
            }
            if session.phase().is_ended() {
                break;
            }
        }
        (events, session.summary())
    };
    let (events, summary) = run(99);
    assert!(summary.rng_draws > 0);
    assert_eq!((events, summary), run(99));
}
