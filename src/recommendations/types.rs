//! Data types for the recommendation system.

use serde::{Deserialize, Serialize};

use crate::catalog::{composite_key, normalize};
use crate::models::EntityKind;
use crate::recommendations::errors::RecommendationError;

/// Number of results a caller may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ResultLimit(usize);

impl ResultLimit {
    pub const ALLOWED: [usize; 4] = [5, 8, 10, 12];

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for ResultLimit {
    fn default() -> Self {
        ResultLimit(10)
    }
}

impl TryFrom<usize> for ResultLimit {
    type Error = RecommendationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if Self::ALLOWED.contains(&value) {
            Ok(ResultLimit(value))
        } else {
            Err(RecommendationError::InvalidLimit(value))
        }
    }
}

impl From<ResultLimit> for usize {
    fn from(limit: ResultLimit) -> Self {
        limit.0
    }
}

/// What to find recommendations for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub kind: EntityKind,
    /// Artist name, album title or track title depending on `kind`.
    pub name: String,
    /// Owning artist; required for albums and tracks.
    pub artist: Option<String>,
    pub limit: ResultLimit,
}

impl RecommendationRequest {
    pub fn artist(name: impl Into<String>, limit: ResultLimit) -> Self {
        Self {
            kind: EntityKind::Artist,
            name: name.into(),
            artist: None,
            limit,
        }
    }

    pub fn album(artist: impl Into<String>, title: impl Into<String>, limit: ResultLimit) -> Self {
        Self {
            kind: EntityKind::Album,
            name: title.into(),
            artist: Some(artist.into()),
            limit,
        }
    }

    pub fn track(artist: impl Into<String>, title: impl Into<String>, limit: ResultLimit) -> Self {
        Self {
            kind: EntityKind::Track,
            name: title.into(),
            artist: Some(artist.into()),
            limit,
        }
    }
}

/// Where a recommendation can be opened or looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLinks {
    /// Page on the metadata service the candidate came from
    pub source_url: String,
    /// MusicBrainz entity page when an id is known, otherwise a search
    pub musicbrainz: String,
    pub youtube_search: String,
    pub spotify_search: String,
}

/// A single recommended artist, album or track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub name: String,
    /// Primary artist. For artist results this is the artist itself.
    pub artist: String,
    pub image_url: Option<String>,
    /// Similarity in [0, 1]
    pub match_score: f64,
    /// At most three tags
    pub tags: Vec<String>,
    pub kind: EntityKind,
    pub links: ExternalLinks,
}

impl RecommendationResult {
    /// Ownership key in the same shape the catalog uses.
    pub fn ownership_key(&self) -> String {
        match self.kind {
            EntityKind::Artist => normalize(&self.name),
            EntityKind::Album | EntityKind::Track => composite_key(&self.artist, &self.name),
        }
    }
}

/// Ordered results for one request, tagged with what they were seeded from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub source_name: String,
    pub source_artist: Option<String>,
    pub kind: EntityKind,
    pub items: Vec<RecommendationResult>,
}

impl RecommendationSet {
    pub fn empty(request: &RecommendationRequest) -> Self {
        Self {
            source_name: request.name.trim().to_string(),
            source_artist: request.artist.as_ref().map(|a| a.trim().to_string()),
            kind: request.kind,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_limit_accepts_only_known_sizes() {
        for n in ResultLimit::ALLOWED {
            assert_eq!(ResultLimit::try_from(n).unwrap().get(), n);
        }
        assert!(matches!(
            ResultLimit::try_from(7),
            Err(RecommendationError::InvalidLimit(7))
        ));
        assert!(serde_json::from_str::<ResultLimit>("11").is_err());
        assert_eq!(serde_json::from_str::<ResultLimit>("12").unwrap().get(), 12);
    }

    #[test]
    fn test_empty_set_keeps_source_metadata() {
        let request = RecommendationRequest::album(" Radiohead ", "Kid A", ResultLimit::default());
        let set = RecommendationSet::empty(&request);
        assert_eq!(set.source_name, "Kid A");
        assert_eq!(set.source_artist.as_deref(), Some("Radiohead"));
        assert_eq!(set.kind, EntityKind::Album);
        assert!(set.is_empty());
    }
}
