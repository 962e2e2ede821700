use dhikr_game::{AchievementRule, Catalog, DataLoader, GameMode, SessionConfig};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

const EMBEDDED_PHRASES: &str = include_str!("../../../dhikr-game/assets/data/phrases.json");
const EMBEDDED_NAMES: &str = include_str!("../../../dhikr-game/assets/data/names.json");
const EMBEDDED_ACHIEVEMENTS: &str =
    include_str!("../../../dhikr-game/assets/data/achievements.json");
const EMBEDDED_SESSION: &str = include_str!("../../../dhikr-game/assets/data/session.json");

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid catalog: {0}")]
    Catalog(#[from] dhikr_game::CatalogError),
    #[error("invalid JSON in {name}: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown config `{0}`")]
    UnknownConfig(String),
}

/// Static content for simulations: files on disk when present, the copies
/// compiled into the binary otherwise.
#[derive(Debug, Clone)]
pub struct TesterAssets {
    phrases: String,
    names: String,
    achievements: String,
    session: String,
}

impl TesterAssets {
    pub fn load_default() -> Self {
        Self {
            phrases: Self::read_or("phrases.json", EMBEDDED_PHRASES),
            names: Self::read_or("names.json", EMBEDDED_NAMES),
            achievements: Self::read_or("achievements.json", EMBEDDED_ACHIEVEMENTS),
            session: Self::read_or("session.json", EMBEDDED_SESSION),
        }
    }

    #[cfg(test)]
    pub fn embedded() -> Self {
        Self {
            phrases: EMBEDDED_PHRASES.to_string(),
            names: EMBEDDED_NAMES.to_string(),
            achievements: EMBEDDED_ACHIEVEMENTS.to_string(),
            session: EMBEDDED_SESSION.to_string(),
        }
    }

    fn assets_data_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("dhikr-game")
            .join("assets")
            .join("data")
    }

    fn read_or(file: &str, fallback: &str) -> String {
        let path = Self::assets_data_root().join(file);
        match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) => {
                log::debug!("{} unavailable ({err}); using embedded copy", path.display());
                fallback.to_string()
            }
        }
    }

    pub fn session_config(&self) -> Result<SessionConfig, AssetError> {
        self.load_config(dhikr_game::SESSION_CONFIG_NAME)
    }
}

impl DataLoader for TesterAssets {
    type Error = AssetError;

    fn load_catalog(&self, mode: GameMode) -> Result<Catalog, Self::Error> {
        let json = match mode {
            GameMode::Focus | GameMode::Tasbih => &self.phrases,
            GameMode::Names => &self.names,
        };
        Ok(Catalog::from_json(json)?)
    }

    fn load_achievement_rules(&self) -> Result<Vec<AchievementRule>, Self::Error> {
        serde_json::from_str(&self.achievements).map_err(|source| AssetError::Json {
            name: "achievements.json".to_string(),
            source,
        })
    }

    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        if config_name != dhikr_game::SESSION_CONFIG_NAME {
            return Err(AssetError::UnknownConfig(config_name.to_string()));
        }
        serde_json::from_str(&self.session).map_err(|source| AssetError::Json {
            name: format!("{config_name}.json"),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_assets_load() {
        let assets = TesterAssets::embedded();
        assert_eq!(
            assets.load_catalog(GameMode::Focus).unwrap().easy_item_id(),
            "subhanallah"
        );
        assert!(assets.load_catalog(GameMode::Names).unwrap().len() >= 5);
        assert!(!assets.load_achievement_rules().unwrap().is_empty());
        assert_eq!(assets.session_config().unwrap(), SessionConfig::default());
        assert!(matches!(
            assets.load_config::<SessionConfig>("missing"),
            Err(AssetError::UnknownConfig(_))
        ));
    }
}
