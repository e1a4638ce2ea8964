use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{composite_key, normalize};
use crate::models::EntityKind;
use crate::recommendations::RecommendationResult;

/// Identity of a saved item: case-insensitive (name, artist, kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemKey {
    pub name: String,
    pub artist: String,
    pub kind: EntityKind,
}

impl ItemKey {
    pub fn new(name: impl Into<String>, artist: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
            kind,
        }
    }

    pub fn normalized(&self) -> (String, String, EntityKind) {
        (normalize(&self.name), normalize(&self.artist), self.kind)
    }

    pub fn matches(&self, other: &ItemKey) -> bool {
        self.normalized() == other.normalized()
    }

    /// The same key in the catalog's `artist\0title` form.
    pub fn ownership_key(&self) -> String {
        match self.kind {
            EntityKind::Artist => normalize(&self.name),
            EntityKind::Album | EntityKind::Track => composite_key(&self.artist, &self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedItem {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub artist: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub link: String,
    /// Unix seconds; stamped by the store on save.
    #[serde(default)]
    pub saved_at: i64,
}

impl SavedItem {
    pub fn new(name: impl Into<String>, artist: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            artist: artist.into(),
            kind,
            image_url: None,
            tags: Vec::new(),
            score: 0.0,
            link: String::new(),
            saved_at: Utc::now().timestamp(),
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.name.clone(), self.artist.clone(), self.kind)
    }
}

impl From<&RecommendationResult> for SavedItem {
    fn from(result: &RecommendationResult) -> Self {
        Self {
            image_url: result.image_url.clone(),
            tags: result.tags.clone(),
            score: result.match_score,
            link: result.links.source_url.clone(),
            ..SavedItem::new(result.name.clone(), result.artist.clone(), result.kind)
        }
    }
}

/// Everything one user has saved, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCollection {
    pub user_id: String,
    pub items: Vec<SavedItem>,
}

impl UserCollection {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            items: Vec::new(),
        }
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        let wanted = key.normalized();
        self.items.iter().any(|i| i.key().normalized() == wanted)
    }

    /// Add the item unless its key is already present.
    pub fn insert(&mut self, item: SavedItem) -> bool {
        if self.contains(&item.key()) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, key: &ItemKey) -> bool {
        let before = self.items.len();
        self.items.retain(|i| !i.key().matches(key));
        self.items.len() != before
    }

    /// Newest first; ties keep the later insertion first.
    pub fn most_recent(&self, cap: Option<usize>) -> Vec<SavedItem> {
        let mut items: Vec<SavedItem> = self.items.iter().rev().cloned().collect();
        items.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        if let Some(cap) = cap {
            items.truncate(cap);
        }
        items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}
