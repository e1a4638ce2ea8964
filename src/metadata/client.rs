//! Cached, rate-limited client for the similar-items metadata service.
//!
//! Every operation follows the same path:
//! 1. Look up the canonical cache key; an unexpired hit returns immediately
//! 2. Otherwise take a slot from the rate gate and call the transport
//! 3. Parse the payload; successes are cached under the TTL, failures are not
//!
//! Failures of any kind come back as an empty list or `None`. The client is
//! built once and shared (behind an `Arc`) for the life of the process.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::cache::{cache_key, ResponseCache};
use super::error::MetadataError;
use super::models::{
    parse_album_info, parse_artist_info, parse_similar_artists, parse_similar_tracks,
    parse_top_albums, AlbumInfo, ArtistInfo, SimilarItemEntry, TopAlbum,
};
use super::rate_limit::RateGate;
use super::transport::{LastFmTransport, MetadataTransport};
use crate::config::RecommenderConfig;

const METHOD_SIMILAR_ARTISTS: &str = "artist.getsimilar";
const METHOD_SIMILAR_TRACKS: &str = "track.getsimilar";
const METHOD_ALBUM_INFO: &str = "album.getinfo";
const METHOD_ARTIST_INFO: &str = "artist.getinfo";
const METHOD_TOP_ALBUMS: &str = "artist.gettopalbums";
const OP_FALLBACK_IMAGE: &str = "fallback.artistimage";

pub struct MetadataClient {
    transport: Arc<dyn MetadataTransport>,
    cache: ResponseCache,
    gate: RateGate,
}

impl MetadataClient {
    pub fn new(transport: Arc<dyn MetadataTransport>, cache_ttl: Duration) -> Self {
        Self::with_parts(transport, ResponseCache::new(cache_ttl), RateGate::default())
    }

    pub fn with_parts(
        transport: Arc<dyn MetadataTransport>,
        cache: ResponseCache,
        gate: RateGate,
    ) -> Self {
        Self {
            transport,
            cache,
            gate,
        }
    }

    /// Build the HTTP-backed client described by `config`.
    pub fn from_config(config: &RecommenderConfig) -> Result<Self, MetadataError> {
        let transport = LastFmTransport::new(config)?;
        log::info!(
            "Metadata client ready (cache TTL {} min, credential {})",
            config.cache_ttl_minutes,
            if transport.has_credential() { "present" } else { "missing" }
        );
        Ok(Self::new(Arc::new(transport), config.cache_ttl()))
    }

    pub fn has_credential(&self) -> bool {
        self.transport.has_credential()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn similar_artists(
        &self,
        name: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Vec<SimilarItemEntry> {
        let limit = limit.to_string();
        let params = [("artist", name), ("limit", limit.as_str())];
        self.cached_call(METHOD_SIMILAR_ARTISTS, &params, cancel, parse_similar_artists)
            .await
            .unwrap_or_default()
    }

    pub async fn similar_tracks(
        &self,
        artist: &str,
        track: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Vec<SimilarItemEntry> {
        let limit = limit.to_string();
        let params = [("artist", artist), ("track", track), ("limit", limit.as_str())];
        self.cached_call(METHOD_SIMILAR_TRACKS, &params, cancel, parse_similar_tracks)
            .await
            .unwrap_or_default()
    }

    pub async fn album_info(
        &self,
        artist: &str,
        album: &str,
        cancel: &CancellationToken,
    ) -> Option<AlbumInfo> {
        let params = [("artist", artist), ("album", album)];
        self.cached_call(METHOD_ALBUM_INFO, &params, cancel, parse_album_info)
            .await
    }

    pub async fn artist_info(&self, artist: &str, cancel: &CancellationToken) -> Option<ArtistInfo> {
        let params = [("artist", artist)];
        self.cached_call(METHOD_ARTIST_INFO, &params, cancel, parse_artist_info)
            .await
    }

    pub async fn artist_top_albums(
        &self,
        artist: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Vec<TopAlbum> {
        let limit = limit.to_string();
        let params = [("artist", artist), ("limit", limit.as_str())];
        self.cached_call(METHOD_TOP_ALBUMS, &params, cancel, parse_top_albums)
            .await
            .unwrap_or_default()
    }

    /// Secondary artist-picture lookup. "No picture" answers are cached too,
    /// so an artist without one costs a single outbound call per TTL.
    pub async fn fallback_artist_image(
        &self,
        artist: &str,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let key = cache_key(OP_FALLBACK_IMAGE, &[("artist", artist)]);
        self.cached(key, cancel, self.transport.artist_image(artist))
            .await
            .flatten()
    }

    async fn cached_call<T>(
        &self,
        method: &str,
        params: &[(&str, &str)],
        cancel: &CancellationToken,
        parse: fn(&Value) -> Result<T, MetadataError>,
    ) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let key = cache_key(method, params);
        let fetch = async {
            let data = self.transport.call(method, params).await?;
            parse(&data)
        };
        self.cached(key, cancel, fetch).await
    }

    async fn cached<T, F>(&self, key: String, cancel: &CancellationToken, fetch: F) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = Result<T, MetadataError>>,
    {
        if let Some(hit) = self.cache.get_typed::<T>(&key) {
            log::debug!("Cache hit for '{}'", key);
            return Some(hit);
        }

        if cancel.is_cancelled() {
            return None;
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(MetadataError::Cancelled),
            r = async {
                let _permit = self.gate.acquire().await?;
                fetch.await
            } => r,
        };

        match result {
            Ok(value) => {
                self.cache.insert_typed(key, &value);
                Some(value)
            }
            Err(MetadataError::Cancelled) => {
                log::debug!("Lookup '{}' cancelled", key);
                None
            }
            Err(e) => {
                log::warn!("Metadata lookup '{}' failed: {}", key, e);
                None
            }
        }
    }
}
