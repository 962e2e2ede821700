//! Static practice content: phrases (or names) in unlock order.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Spawn-probability bucket derived from the word count of an item's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightClass {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl WeightClass {
    /// All tiers in selection order.
    pub const ALL: [Self; 4] = [Self::Tier1, Self::Tier2, Self::Tier3, Self::Tier4];

    /// Bucket an item by how many words its text contains.
    #[must_use]
    pub fn from_word_count(words: usize) -> Self {
        match words {
            0..=2 => Self::Tier1,
            3..=4 => Self::Tier2,
            5..=6 => Self::Tier3,
            _ => Self::Tier4,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Tier1 => 0,
            Self::Tier2 => 1,
            Self::Tier3 => 2,
            Self::Tier4 => 3,
        }
    }
}

/// Raw catalog entry as stored in content files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeItemDef {
    pub id: String,
    pub text: String,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default)]
    pub unlock_threshold: u64,
}

const fn default_points() -> u32 {
    10
}

/// Immutable practice unit loaded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PracticeItemDef", into = "PracticeItemDef")]
pub struct PracticeItem {
    pub id: String,
    pub display_text: String,
    pub point_value: u32,
    pub unlock_threshold: u64,
    pub weight_class: WeightClass,
}

impl PracticeItem {
    #[must_use]
    pub fn new(id: &str, display_text: &str, point_value: u32, unlock_threshold: u64) -> Self {
        let words = display_text.split_whitespace().count();
        Self {
            id: id.to_string(),
            display_text: display_text.to_string(),
            point_value,
            unlock_threshold,
            weight_class: WeightClass::from_word_count(words),
        }
    }
}

impl From<PracticeItemDef> for PracticeItem {
    fn from(def: PracticeItemDef) -> Self {
        Self::new(&def.id, &def.text, def.points, def.unlock_threshold)
    }
}

impl From<PracticeItem> for PracticeItemDef {
    fn from(item: PracticeItem) -> Self {
        Self {
            id: item.id,
            text: item.display_text,
            points: item.point_value,
            unlock_threshold: item.unlock_threshold,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog contains no items")]
    Empty,
    #[error("duplicate item id `{0}`")]
    DuplicateId(String),
    #[error("designated easy item `{0}` is not in the catalog")]
    UnknownEasyItem(String),
    #[error("item `{id}` unlocks at {threshold}, below the preceding item's {previous}")]
    OutOfOrder {
        id: String,
        threshold: u64,
        previous: u64,
    },
    #[error("catalog JSON is malformed: {0}")]
    Parse(String),
}

/// Practice items in unlock order plus the designated easy item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    easy_item: String,
    items: Vec<PracticeItem>,
}

impl Catalog {
    /// Build and validate a catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` when the catalog is empty, has duplicate ids,
    /// names an unknown easy item or is not sorted by unlock threshold.
    pub fn new(easy_item: &str, items: Vec<PracticeItem>) -> Result<Self, CatalogError> {
        let catalog = Self {
            easy_item: easy_item.to_string(),
            items,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse and validate a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed JSON, or any validation error.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let parsed: Self =
            serde_json::from_str(json).map_err(|err| CatalogError::Parse(err.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.items.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::with_capacity(self.items.len());
        let mut previous = 0_u64;
        for item in &self.items {
            if !seen.insert(item.id.as_str()) {
                return Err(CatalogError::DuplicateId(item.id.clone()));
            }
            if item.unlock_threshold < previous {
                return Err(CatalogError::OutOfOrder {
                    id: item.id.clone(),
                    threshold: item.unlock_threshold,
                    previous,
                });
            }
            previous = item.unlock_threshold;
        }
        if !seen.contains(self.easy_item.as_str()) {
            return Err(CatalogError::UnknownEasyItem(self.easy_item.clone()));
        }
        Ok(())
    }

    /// Items in unlock order.
    #[must_use]
    pub fn items(&self) -> &[PracticeItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PracticeItem> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Id of the item used for bootstrap and rescue spawns.
    #[must_use]
    pub fn easy_item_id(&self) -> &str {
        &self.easy_item
    }

    #[must_use]
    pub fn easy_item(&self) -> Option<&PracticeItem> {
        self.get(&self.easy_item)
    }
}
