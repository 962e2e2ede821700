#![allow(dead_code)]

use std::io;

use dhikr_game::{AchievementRule, Catalog, DataLoader, GameMode, InstanceId, SessionLoop};
use serde::de::DeserializeOwned;

pub const PHRASES: &str = include_str!("../../assets/data/phrases.json");
pub const NAMES: &str = include_str!("../../assets/data/names.json");
pub const ACHIEVEMENTS: &str = include_str!("../../assets/data/achievements.json");
pub const SESSION: &str = include_str!("../../assets/data/session.json");

/// Loader over the bundled JSON assets.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetLoader;

impl DataLoader for AssetLoader {
    type Error = io::Error;

    fn load_catalog(&self, mode: GameMode) -> Result<Catalog, Self::Error> {
        let json = match mode {
            GameMode::Focus | GameMode::Tasbih => PHRASES,
            GameMode::Names => NAMES,
        };
        Catalog::from_json(json).map_err(io::Error::other)
    }

    fn load_achievement_rules(&self) -> Result<Vec<AchievementRule>, Self::Error> {
        serde_json::from_str(ACHIEVEMENTS).map_err(io::Error::other)
    }

    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        match config_name {
            "session" => serde_json::from_str(SESSION).map_err(io::Error::other),
            other => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("unknown config {other}"),
            )),
        }
    }
}

/// Tap every instance on screen; returns how many taps landed.
pub fn tap_all(session: &mut SessionLoop) -> usize {
    let ids: Vec<InstanceId> = session
        .active_items()
        .iter()
        .map(|active| active.instance_id)
        .collect();
    let mut hits = 0;
    for id in ids {
        if session.phase().is_running() && session.tap(id).unwrap().is_hit() {
            hits += 1;
        }
    }
    hits
}
