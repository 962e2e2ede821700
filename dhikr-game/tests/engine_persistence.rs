mod common;

use chrono::{Datelike, NaiveDate};
use common::{AssetLoader, tap_all};
use dhikr_game::{
    EndReason, MemoryProfileStore, ModeSelection, PracticeEngine, ProfileRecord, ProfileStore,
    StreakOutcome,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
}

fn engine() -> PracticeEngine<AssetLoader, MemoryProfileStore> {
    PracticeEngine::new(AssetLoader, MemoryProfileStore::default())
}

/// Play `ticks` ticks tapping everything, then finish.
fn play(
    engine: &PracticeEngine<AssetLoader, MemoryProfileStore>,
    user: &str,
    selection: ModeSelection,
    today: NaiveDate,
    ticks: usize,
) -> dhikr_game::SessionReport {
    let started_at = today.and_hms_opt(8, 0, 0).unwrap().and_utc();
    let mut practice = engine
        .start_session(user, selection, today, started_at, u64::from(today.ordinal()))
        .unwrap();
    for _ in 0..ticks {
        if practice.session.phase().is_ended() {
            break;
        }
        practice.session.tick().unwrap();
        tap_all(&mut practice.session);
    }
    engine.finish_session(practice, today).unwrap()
}

#[test]
fn progress_accumulates_across_days() {
    let engine = engine();
    let first = play(&engine, "amina", ModeSelection::Focus, day(1), 600);
    assert_eq!(first.streak, Some(StreakOutcome::Started));
    assert!(first.persisted);
    assert!(first.new_achievements.contains(&"first_drop".to_string()));
    assert_eq!(first.summary.end_reason, Some(EndReason::Quit));

    let second = play(&engine, "amina", ModeSelection::Focus, day(2), 600);
    assert_eq!(second.streak, Some(StreakOutcome::Continued));
    assert!(!second.new_achievements.contains(&"first_drop".to_string()));

    let stored = engine.store().get_profile("amina").unwrap().unwrap();
    assert_eq!(
        stored.total_points,
        first.summary.score + second.summary.score
    );
    assert_eq!(stored.sessions_completed, 2);
    assert_eq!(stored.current_streak, 2);
    assert_eq!(stored.daily_stats.len(), 2);
    assert_eq!(stored.daily_points_today, second.summary.score);
    assert!(stored.achievements.contains("thousand_points"));
    assert!(stored.unlocked_item_ids.contains("astaghfirullah"));
}

#[test]
fn names_progress_resumes_from_stored_taps() {
    let engine = engine();
    engine.store().insert(
        "yusuf",
        ProfileRecord {
            per_item_tap_counts: [("ar_rahman".to_string(), 40), ("subhanallah".to_string(), 500)]
                .into(),
            ..ProfileRecord::default()
        },
    );
    let report = play(&engine, "yusuf", ModeSelection::Names, day(5), 1);
    let stored = engine.store().snapshot("yusuf").unwrap();
    assert!(stored.unlocked_item_ids.contains("as_salam"));
    assert!(!stored.unlocked_item_ids.contains("al_mumin"));
    assert!(report.new_achievements.contains(&"first_name".to_string()));
}

#[test]
fn tasbih_completion_is_credited() {
    let engine = engine();
    let report = play(
        &engine,
        "zaid",
        ModeSelection::Tasbih {
            item_id: "subhanallah".to_string(),
            target: 33,
        },
        day(9),
        10_000,
    );
    assert_eq!(report.summary.end_reason, Some(EndReason::TargetReached));
    assert_eq!(report.summary.score, 330);
    assert_eq!(report.profile.per_item_tap_counts.get("subhanallah"), Some(&33));
    assert!(report.new_achievements.contains(&"tasbih_33".to_string()));
}

#[test]
fn leaderboard_reports_own_rank() {
    let engine = engine();
    for (user, points) in [("a", 900), ("b", 700), ("c", 500), ("d", 100)] {
        engine.store().insert(
            user,
            ProfileRecord {
                total_points: points,
                ..ProfileRecord::default()
            },
        );
    }
    let board = engine.leaderboard(2, Some("d")).unwrap();
    assert_eq!(board.top.len(), 2);
    assert_eq!(board.top[0].user_id, "a");
    assert_eq!(board.own.map(|own| own.rank), Some(4));
}
