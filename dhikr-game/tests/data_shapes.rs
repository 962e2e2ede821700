mod common;

use std::hash::Hasher;

use chrono::{DateTime, Utc};
use common::{ACHIEVEMENTS, AssetLoader, NAMES, PHRASES, SESSION};
use dhikr_game::{
    AchievementRule, Catalog, DataLoader, GameMode, ModeSelection, SessionConfig, SessionLoop,
    SessionSetup, SessionSummary, UnlockPolicy, WeightClass,
};
use serde_json::{Map, Value};
use twox_hash::XxHash64;

#[test]
fn bundled_session_config_matches_defaults() {
    let bundled: SessionConfig = serde_json::from_str(SESSION).unwrap();
    bundled.validate().unwrap();
    let bundled_hash = config_hash(&bundled);
    assert_eq!(
        bundled_hash,
        config_hash(&SessionConfig::default()),
        "session.json drifted from the compiled defaults\n{SESSION}"
    );
    let partial: SessionConfig = serde_json::from_str(r#"{"tick_ms": 25}"#).unwrap();
    assert_ne!(config_hash(&partial), bundled_hash);
}

#[test]
fn phrase_catalog_shape() {
    let catalog = Catalog::from_json(PHRASES).unwrap();
    assert_eq!(catalog.easy_item_id(), "subhanallah");
    let seed = UnlockPolicy::PointThreshold.unlocked_items(0, &catalog);
    assert_eq!(seed.len(), 3);
    assert_eq!(
        UnlockPolicy::PointThreshold
            .unlocked_items(u64::MAX, &catalog)
            .len(),
        catalog.len()
    );
    let longest = catalog.items().last().unwrap();
    assert_eq!(longest.weight_class, WeightClass::Tier4);
    assert!(
        catalog
            .items()
            .iter()
            .any(|item| item.weight_class == WeightClass::Tier1)
    );
}

#[test]
fn names_catalog_seed_set_is_four() {
    let catalog = Catalog::from_json(NAMES).unwrap();
    let policy = ModeSelection::Names.rules().unlock_policy();
    assert_eq!(policy.unlocked_count(0, &catalog), 4);
    assert_eq!(policy.unlocked_count(32, &catalog), 4);
    assert_eq!(policy.unlocked_count(33, &catalog), 5);
    assert_eq!(policy.unlocked_count(1_000_000, &catalog), catalog.len());
}

#[test]
fn achievement_table_keeps_unsupported_kinds() {
    let rules: Vec<AchievementRule> = serde_json::from_str(ACHIEVEMENTS).unwrap();
    let unsupported: Vec<&str> = rules
        .iter()
        .filter(|rule| !rule.predicate.is_supported())
        .map(|rule| rule.id.as_str())
        .collect();
    assert_eq!(
        unsupported,
        vec!["night_prayer", "silent_heart", "weekly_names"]
    );
    let ids: std::collections::BTreeSet<&str> =
        rules.iter().map(|rule| rule.id.as_str()).collect();
    assert_eq!(ids.len(), rules.len(), "duplicate achievement id");
}

#[test]
fn summary_serialization_round_trips() {
    let catalog = AssetLoader.load_catalog(GameMode::Focus).unwrap();
    let mut session = SessionLoop::new(SessionSetup {
        selection: ModeSelection::Focus,
        catalog,
        config: SessionConfig::default(),
        seed: 0xFACE_B00C,
        starting_progress: 0,
        started_at: DateTime::<Utc>::UNIX_EPOCH,
    })
    .unwrap();
    session.start().unwrap();
    for _ in 0..40 {
        session.tick().unwrap();
        common::tap_all(&mut session);
    }
    session.quit().unwrap();
    let summary = session.summary();
    let saved = serde_json::to_string(&summary).unwrap();
    let restored: SessionSummary = serde_json::from_str(&saved).unwrap();
    assert_eq!(restored, summary);
    assert_eq!(
        serde_json::to_value(&summary).unwrap()["end_reason"],
        Value::String("quit".to_string())
    );
}

fn config_hash(config: &SessionConfig) -> u64 {
    let value = canonicalize_value(serde_json::to_value(config).unwrap());
    let canonical = serde_json::to_string_pretty(&value).unwrap();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(canonical.as_bytes());
    hasher.finish()
}

fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize_value).collect()),
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut result = Map::with_capacity(entries.len());
            for (key, value) in entries {
                result.insert(key, canonicalize_value(value));
            }
            Value::Object(result)
        }
        other => other,
    }
}
