//! Typed views over the metadata service's JSON payloads.
//!
//! The service is loose with its shapes: list fields collapse to a bare
//! object when there is exactly one element, numeric fields arrive as
//! strings, and an empty tag list is sometimes `""`. The parsers below
//! absorb all of that and only fail when the top-level container is absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::MetadataError;

/// One (size-tag, URL) image candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    pub size: String,
    pub url: String,
}

/// A similar artist or similar track as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarItemEntry {
    pub name: String,
    /// Owning artist; only present on similar-track entries.
    pub artist: Option<String>,
    pub mbid: Option<String>,
    /// Similarity in [0, 1].
    pub match_score: f64,
    pub images: Vec<ImageCandidate>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistInfo {
    pub name: String,
    pub mbid: Option<String>,
    pub url: String,
    pub images: Vec<ImageCandidate>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumInfo {
    pub name: String,
    pub artist: String,
    pub mbid: Option<String>,
    pub url: String,
    pub images: Vec<ImageCandidate>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopAlbum {
    pub name: String,
    pub artist: String,
    pub mbid: Option<String>,
    pub url: String,
    pub images: Vec<ImageCandidate>,
    pub playcount: u64,
}

/// Check a response body for the service's `{"error": N, "message": ...}` shape.
pub fn check_api_error(data: &Value) -> Result<(), MetadataError> {
    if let Some(code) = data.get("error").and_then(as_i64) {
        let message = data
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(MetadataError::Api { code, message });
    }
    Ok(())
}

pub fn parse_similar_artists(data: &Value) -> Result<Vec<SimilarItemEntry>, MetadataError> {
    let root = container(data, "similarartists")?;
    Ok(as_list(root.get("artist"))
        .into_iter()
        .filter_map(|item| {
            Some(SimilarItemEntry {
                name: non_empty_str(item.get("name"))?,
                artist: None,
                mbid: non_empty_str(item.get("mbid")),
                match_score: parse_score(item.get("match")),
                images: parse_images(item.get("image")),
                url: non_empty_str(item.get("url")).unwrap_or_default(),
            })
        })
        .collect())
}

pub fn parse_similar_tracks(data: &Value) -> Result<Vec<SimilarItemEntry>, MetadataError> {
    let root = container(data, "similartracks")?;
    Ok(as_list(root.get("track"))
        .into_iter()
        .filter_map(|item| {
            Some(SimilarItemEntry {
                name: non_empty_str(item.get("name"))?,
                artist: artist_name(item.get("artist")),
                mbid: non_empty_str(item.get("mbid")),
                match_score: parse_score(item.get("match")),
                images: parse_images(item.get("image")),
                url: non_empty_str(item.get("url")).unwrap_or_default(),
            })
        })
        .collect())
}

pub fn parse_artist_info(data: &Value) -> Result<ArtistInfo, MetadataError> {
    let root = container(data, "artist")?;
    Ok(ArtistInfo {
        name: non_empty_str(root.get("name"))
            .ok_or_else(|| MetadataError::Malformed("artist without name".to_string()))?,
        mbid: non_empty_str(root.get("mbid")),
        url: non_empty_str(root.get("url")).unwrap_or_default(),
        images: parse_images(root.get("image")),
        tags: parse_tags(root.get("tags")),
    })
}

pub fn parse_album_info(data: &Value) -> Result<AlbumInfo, MetadataError> {
    let root = container(data, "album")?;
    Ok(AlbumInfo {
        name: non_empty_str(root.get("name"))
            .ok_or_else(|| MetadataError::Malformed("album without name".to_string()))?,
        artist: artist_name(root.get("artist")).unwrap_or_default(),
        mbid: non_empty_str(root.get("mbid")),
        url: non_empty_str(root.get("url")).unwrap_or_default(),
        images: parse_images(root.get("image")),
        tags: parse_tags(root.get("tags")),
    })
}

pub fn parse_top_albums(data: &Value) -> Result<Vec<TopAlbum>, MetadataError> {
    let root = container(data, "topalbums")?;
    Ok(as_list(root.get("album"))
        .into_iter()
        .filter_map(|item| {
            Some(TopAlbum {
                name: non_empty_str(item.get("name"))?,
                artist: artist_name(item.get("artist")).unwrap_or_default(),
                mbid: non_empty_str(item.get("mbid")),
                url: non_empty_str(item.get("url")).unwrap_or_default(),
                images: parse_images(item.get("image")),
                playcount: item.get("playcount").and_then(as_i64).unwrap_or(0).max(0) as u64,
            })
        })
        .collect())
}

fn container<'a>(data: &'a Value, key: &str) -> Result<&'a Value, MetadataError> {
    data.get(key)
        .filter(|v| v.is_object())
        .ok_or_else(|| MetadataError::Malformed(format!("missing '{}' object", key)))
}

/// Normalize "array or single object or nothing" into a list.
fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_score(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Artists appear either as a plain string or as `{ "name": ... }`.
fn artist_name(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(_)) => non_empty_str(value),
        Some(obj @ Value::Object(_)) => {
            non_empty_str(obj.get("name")).or_else(|| non_empty_str(obj.get("#text")))
        }
        _ => None,
    }
}

fn parse_images(value: Option<&Value>) -> Vec<ImageCandidate> {
    as_list(value)
        .into_iter()
        .filter_map(|img| {
            Some(ImageCandidate {
                size: img
                    .get("size")
                    .and_then(|s| s.as_str())
                    .unwrap_or("")
                    .to_string(),
                url: non_empty_str(img.get("#text"))?,
            })
        })
        .collect()
}

fn parse_tags(value: Option<&Value>) -> Vec<String> {
    let Some(tags) = value.filter(|v| v.is_object()) else {
        return Vec::new();
    };
    as_list(tags.get("tag"))
        .into_iter()
        .filter_map(|tag| non_empty_str(tag.get("name")))
        .collect()
}
