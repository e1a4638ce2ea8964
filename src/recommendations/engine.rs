//! Recommendation engine implementation.
//!
//! Generates music recommendations by:
//! 1. Fetching similar-item candidates from the metadata service (cached)
//! 2. Dropping candidates the reference catalog already owns
//! 3. Ranking and truncating to the requested limit
//! 4. Enriching the survivors with tags and images, concurrently
//!
//! Each entity kind has its own pipeline function; they share the same
//! contract. Filtering always runs before enrichment so no outbound calls
//! are spent on candidates that get discarded.

use futures_util::future::join_all;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::catalog::{composite_key, normalize, ReferenceCatalog};
use crate::config::{OverfetchConfig, RecommenderConfig};
use crate::metadata::{MetadataClient, SimilarItemEntry, TopAlbum};
use crate::models::EntityKind;
use crate::recommendations::errors::RecommendationError;
use crate::recommendations::images::resolve_image;
use crate::recommendations::links::build_links;
use crate::recommendations::types::{
    RecommendationRequest, RecommendationResult, RecommendationSet,
};

/// Maximum tags kept per recommendation.
const MAX_TAGS: usize = 3;

/// Top albums requested from each similar artist in the album fan-out.
const TOP_ALBUMS_PER_ARTIST: usize = 3;

/// Only this many album survivors get a tag lookup.
const ALBUM_ENRICHMENT_LIMIT: usize = 5;

/// Per-kind switches and over-fetch sizing.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub artists_enabled: bool,
    pub albums_enabled: bool,
    pub tracks_enabled: bool,
    pub overfetch: OverfetchConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            artists_enabled: true,
            albums_enabled: true,
            tracks_enabled: true,
            overfetch: OverfetchConfig::default(),
        }
    }
}

impl From<&RecommenderConfig> for EngineSettings {
    fn from(config: &RecommenderConfig) -> Self {
        Self {
            artists_enabled: config.artists_enabled,
            albums_enabled: config.albums_enabled,
            tracks_enabled: config.tracks_enabled,
            overfetch: config.overfetch.clone(),
        }
    }
}

/// An album from the fan-out, carrying the score of the artist it came from.
struct AlbumCandidate {
    album: TopAlbum,
    artist: String,
    score: f64,
}

/// Engine for generating music recommendations.
///
/// Holds the shared metadata client and a handle to the caller's catalog.
/// Designed to be created once and shared across requests.
pub struct RecommendationEngine {
    client: Arc<MetadataClient>,
    catalog: Arc<dyn ReferenceCatalog>,
    settings: EngineSettings,
}

impl RecommendationEngine {
    pub fn new(
        client: Arc<MetadataClient>,
        catalog: Arc<dyn ReferenceCatalog>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            client,
            catalog,
            settings,
        }
    }

    pub fn client(&self) -> &Arc<MetadataClient> {
        &self.client
    }

    fn kind_enabled(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Artist => self.settings.artists_enabled,
            EntityKind::Album => self.settings.albums_enabled,
            EntityKind::Track => self.settings.tracks_enabled,
        }
    }

    /// Generate recommendations for one artist, album or track.
    ///
    /// Remote failures shrink the result rather than failing it; the only
    /// errors are a missing credential, a malformed request and cancellation.
    pub async fn recommend(
        &self,
        request: &RecommendationRequest,
        cancel: &CancellationToken,
    ) -> Result<RecommendationSet, RecommendationError> {
        if !self.client.has_credential() {
            return Err(RecommendationError::MissingCredential);
        }

        let name = request.name.trim();
        if name.is_empty() {
            return Err(RecommendationError::InvalidRequest(
                request.kind,
                "name is empty".to_string(),
            ));
        }
        let artist = request.artist.as_deref().map(str::trim).unwrap_or("");
        if request.kind != EntityKind::Artist && artist.is_empty() {
            return Err(RecommendationError::InvalidRequest(
                request.kind,
                "artist is required".to_string(),
            ));
        }

        let mut set = RecommendationSet::empty(request);

        if !self.kind_enabled(request.kind) {
            log::info!("{} recommendations are disabled, returning empty set", request.kind);
            return Ok(set);
        }

        if cancel.is_cancelled() {
            return Err(RecommendationError::Cancelled);
        }

        let limit = request.limit.get();
        log::info!(
            "Generating {} {} recommendations for '{}'",
            limit,
            request.kind,
            name
        );

        set.items = match request.kind {
            EntityKind::Artist => self.recommend_artists(name, limit, cancel).await,
            EntityKind::Album => self.recommend_albums(artist, name, limit, cancel).await,
            EntityKind::Track => self.recommend_tracks(artist, name, limit, cancel).await,
        };

        if cancel.is_cancelled() {
            return Err(RecommendationError::Cancelled);
        }

        log::info!(
            "Recommendations ready for '{}': {} {} results",
            name,
            set.items.len(),
            request.kind
        );
        Ok(set)
    }

    async fn recommend_artists(
        &self,
        seed: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Vec<RecommendationResult> {
        let fetch_size = self.settings.overfetch.artist.fetch_size(limit);
        let candidates = self.client.similar_artists(seed, fetch_size, cancel).await;
        let fetched = candidates.len();

        let owned = self.catalog.artist_names();
        let seed_key = normalize(seed);
        let survivors: Vec<SimilarItemEntry> = candidates
            .into_iter()
            .filter(|c| {
                let key = normalize(&c.name);
                key != seed_key && !owned.contains(&key)
            })
            .take(limit)
            .collect();

        log::debug!(
            "Artist '{}': {} candidates, {} after ownership filter",
            seed,
            fetched,
            survivors.len()
        );

        if survivors.is_empty() || cancel.is_cancelled() {
            return Vec::new();
        }

        join_all(survivors.iter().map(|c| self.enrich_artist(c, cancel))).await
    }

    /// Tags plus the image chain: candidate images, artist info images,
    /// the fallback picture service, then the artist's top album cover.
    async fn enrich_artist(
        &self,
        candidate: &SimilarItemEntry,
        cancel: &CancellationToken,
    ) -> RecommendationResult {
        let info = self.client.artist_info(&candidate.name, cancel).await;
        let tags = info
            .as_ref()
            .map(|i| top_tags(&i.tags))
            .unwrap_or_default();

        let mut image_url = resolve_image(&candidate.images)
            .or_else(|| info.as_ref().and_then(|i| resolve_image(&i.images)));

        if image_url.is_none() {
            image_url = self
                .client
                .fallback_artist_image(&candidate.name, cancel)
                .await;
        }

        if image_url.is_none() {
            image_url = self
                .client
                .artist_top_albums(&candidate.name, 1, cancel)
                .await
                .first()
                .and_then(|album| resolve_image(&album.images));
        }

        let mbid = candidate
            .mbid
            .as_deref()
            .or_else(|| info.as_ref().and_then(|i| i.mbid.as_deref()));

        RecommendationResult {
            name: candidate.name.clone(),
            artist: candidate.name.clone(),
            image_url,
            match_score: candidate.match_score,
            tags,
            kind: EntityKind::Artist,
            links: build_links(
                EntityKind::Artist,
                &candidate.name,
                &candidate.name,
                mbid,
                &candidate.url,
            ),
        }
    }

    async fn recommend_albums(
        &self,
        seed_artist: &str,
        seed_album: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Vec<RecommendationResult> {
        let fan_out = self.settings.overfetch.album.fetch_size(limit);
        let similar = self
            .client
            .similar_artists(seed_artist, fan_out, cancel)
            .await;

        if similar.is_empty() || cancel.is_cancelled() {
            return Vec::new();
        }

        let lookups = similar.iter().map(|artist| async move {
            let albums = self
                .client
                .artist_top_albums(&artist.name, TOP_ALBUMS_PER_ARTIST, cancel)
                .await;
            (artist, albums)
        });
        let per_artist = join_all(lookups).await;

        let owned = self.catalog.album_keys();
        let seed_key = composite_key(seed_artist, seed_album);
        let mut seen = HashSet::new();
        let mut candidates: Vec<AlbumCandidate> = Vec::new();

        for (similar_artist, albums) in per_artist {
            for album in albums {
                let artist = if album.artist.trim().is_empty() {
                    similar_artist.name.clone()
                } else {
                    album.artist.clone()
                };
                let key = composite_key(&artist, &album.name);
                if key == seed_key || owned.contains(&key) || !seen.insert(key) {
                    continue;
                }
                candidates.push(AlbumCandidate {
                    album,
                    artist,
                    score: similar_artist.match_score,
                });
            }
        }

        let pooled = candidates.len();
        // Stable, so equal scores keep fan-out order.
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        candidates.truncate(limit);

        log::debug!(
            "Album '{}' by '{}': {} similar artists, {} unowned albums, keeping {}",
            seed_album,
            seed_artist,
            similar.len(),
            pooled,
            candidates.len()
        );

        if candidates.is_empty() || cancel.is_cancelled() {
            return Vec::new();
        }

        let enriched = join_all(
            candidates
                .iter()
                .take(ALBUM_ENRICHMENT_LIMIT)
                .map(|c| self.album_tags(c, cancel)),
        )
        .await;

        candidates
            .into_iter()
            .enumerate()
            .map(|(idx, c)| {
                let tags = enriched.get(idx).cloned().unwrap_or_default();
                RecommendationResult {
                    image_url: resolve_image(&c.album.images),
                    match_score: c.score,
                    tags,
                    kind: EntityKind::Album,
                    links: build_links(
                        EntityKind::Album,
                        &c.album.name,
                        &c.artist,
                        c.album.mbid.as_deref(),
                        &c.album.url,
                    ),
                    name: c.album.name,
                    artist: c.artist,
                }
            })
            .collect()
    }

    async fn album_tags(&self, candidate: &AlbumCandidate, cancel: &CancellationToken) -> Vec<String> {
        self.client
            .album_info(&candidate.artist, &candidate.album.name, cancel)
            .await
            .map(|info| top_tags(&info.tags))
            .unwrap_or_default()
    }

    async fn recommend_tracks(
        &self,
        seed_artist: &str,
        seed_track: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Vec<RecommendationResult> {
        let fetch_size = self.settings.overfetch.track.fetch_size(limit);
        let candidates = self
            .client
            .similar_tracks(seed_artist, seed_track, fetch_size, cancel)
            .await;
        let fetched = candidates.len();

        let owned = self.catalog.track_keys();
        let seed_key = composite_key(seed_artist, seed_track);

        let results: Vec<RecommendationResult> = candidates
            .into_iter()
            .filter_map(|c| {
                let artist = c.artist.clone().unwrap_or_default();
                let key = composite_key(&artist, &c.name);
                if key == seed_key || owned.contains(&key) {
                    return None;
                }
                Some(RecommendationResult {
                    image_url: resolve_image(&c.images),
                    match_score: c.match_score,
                    tags: Vec::new(),
                    kind: EntityKind::Track,
                    links: build_links(EntityKind::Track, &c.name, &artist, c.mbid.as_deref(), &c.url),
                    name: c.name,
                    artist,
                })
            })
            .take(limit)
            .collect();

        log::debug!(
            "Track '{}' by '{}': {} candidates, keeping {}",
            seed_track,
            seed_artist,
            fetched,
            results.len()
        );

        results
    }
}

fn top_tags(tags: &[String]) -> Vec<String> {
    tags.iter().take(MAX_TAGS).cloned().collect()
}
