use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";
pub const DEFAULT_FALLBACK_IMAGE_BASE_URL: &str = "https://api.deezer.com";
pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 30;
pub const DEFAULT_RESULT_LIMIT: usize = 10;
pub const REQUEST_TIMEOUT_SECONDS: u64 = 10;
pub const API_KEY_ENV_VAR: &str = "RECOMMENDER_API_KEY";

/// Over-fetch headroom left for ownership filtering: `min(limit * multiplier, cap)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverfetchPolicy {
    pub multiplier: usize,
    pub cap: usize,
}

impl OverfetchPolicy {
    pub const fn new(multiplier: usize, cap: usize) -> Self {
        Self { multiplier, cap }
    }

    pub fn fetch_size(&self, limit: usize) -> usize {
        limit.saturating_mul(self.multiplier).min(self.cap)
    }
}

pub const ARTIST_OVERFETCH: OverfetchPolicy = OverfetchPolicy::new(3, 50);
pub const TRACK_OVERFETCH: OverfetchPolicy = OverfetchPolicy::new(3, 50);
/// For albums this sizes the similar-artist fan-out, not the album list itself.
pub const ALBUM_OVERFETCH: OverfetchPolicy = OverfetchPolicy::new(2, 30);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverfetchConfig {
    pub artist: OverfetchPolicy,
    pub album: OverfetchPolicy,
    pub track: OverfetchPolicy,
}

impl Default for OverfetchConfig {
    fn default() -> Self {
        Self {
            artist: ARTIST_OVERFETCH,
            album: ALBUM_OVERFETCH,
            track: TRACK_OVERFETCH,
        }
    }
}

/// Runtime settings consumed by the client, the engine and the store.
///
/// Values are expected to be validated by whoever produces the file; this
/// type only fills in defaults for anything left out.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub api_key: Option<String>,
    pub result_limit: usize,
    pub cache_ttl_minutes: u64,
    pub artists_enabled: bool,
    pub albums_enabled: bool,
    pub tracks_enabled: bool,
    pub api_base_url: String,
    pub fallback_image_base_url: String,
    pub request_timeout_secs: u64,
    pub database_path: Option<PathBuf>,
    pub overfetch: OverfetchConfig,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            result_limit: DEFAULT_RESULT_LIMIT,
            cache_ttl_minutes: DEFAULT_CACHE_TTL_MINUTES,
            artists_enabled: true,
            albums_enabled: true,
            tracks_enabled: true,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            fallback_image_base_url: DEFAULT_FALLBACK_IMAGE_BASE_URL.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECONDS,
            database_path: None,
            overfetch: OverfetchConfig::default(),
        }
    }
}

impl RecommenderConfig {
    /// Read a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
        let config: RecommenderConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config {:?}: {}", path, e))?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Overlay the API key from the environment when one is set.
    pub fn apply_env(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
            if !key.trim().is_empty() {
                self.api_key = Some(key.trim().to_string());
            }
        }
        self
    }

    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache_ttl_minutes * 60)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("saved_items.db"))
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recommender")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overfetch_sizes() {
        assert_eq!(ARTIST_OVERFETCH.fetch_size(10), 30);
        assert_eq!(ARTIST_OVERFETCH.fetch_size(12), 36);
        assert_eq!(ALBUM_OVERFETCH.fetch_size(12), 24);
        assert_eq!(OverfetchPolicy::new(3, 20).fetch_size(10), 20);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RecommenderConfig =
            serde_json::from_str(r#"{ "api_key": "abc", "tracks_enabled": false }"#).unwrap();
        assert!(config.has_api_key());
        assert!(!config.tracks_enabled);
        assert!(config.artists_enabled);
        assert_eq!(config.cache_ttl_minutes, DEFAULT_CACHE_TTL_MINUTES);
        assert_eq!(config.overfetch, OverfetchConfig::default());
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let config = RecommenderConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("recommender-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{ "cache_ttl_minutes": 5, "result_limit": 8 }"#).unwrap();
        let config = RecommenderConfig::load(&path).unwrap();
        assert_eq!(config.cache_ttl(), std::time::Duration::from_secs(300));
        assert_eq!(config.result_limit, 8);
        let _ = fs::remove_file(path);
    }
}
