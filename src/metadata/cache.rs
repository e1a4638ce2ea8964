//! In-memory TTL cache for metadata responses.
//!
//! Entries are keyed by operation plus canonicalized parameters and hold the
//! already-parsed payload as JSON. Eviction is passive: a key is replaced on
//! overwrite, and once the map grows past the high-water mark an insert
//! sweeps out whatever has already expired.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Entry count above which an insert triggers a sweep of expired entries.
pub const CACHE_HIGH_WATER_MARK: usize = 500;

/// A cached payload with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(payload: T, ttl: Duration) -> Self {
        Self {
            payload,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Build the canonical cache key for an operation.
///
/// Parameters are sorted by name and their values trimmed, lowercased and
/// percent-encoded, so `("Radiohead", 10)` and `(" radiohead", 10)` share an
/// entry while a value containing `&` or `=` cannot pose as another parameter.
pub fn cache_key(operation: &str, params: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(&str, String)> = params
        .iter()
        .map(|(k, v)| (*k, urlencoding::encode(&v.trim().to_lowercase()).into_owned()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}|{}", operation, query)
}

/// Process-wide response cache shared by every request through the client.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry<Value>>>,
    ttl: Duration,
    high_water_mark: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_high_water_mark(ttl, CACHE_HIGH_WATER_MARK)
    }

    pub fn with_high_water_mark(ttl: Duration, high_water_mark: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            high_water_mark,
        }
    }

    /// Raw lookup. Expired entries are dropped and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Typed lookup. A payload that no longer deserializes counts as a miss.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("Discarding unreadable cache entry '{}': {}", key, e);
                self.entries.lock().remove(key);
                None
            }
        }
    }

    pub fn insert(&self, key: String, payload: Value) {
        let mut entries = self.entries.lock();
        if entries.len() > self.high_water_mark {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired());
            log::debug!(
                "Cache sweep removed {} expired entries ({} remain)",
                before - entries.len(),
                entries.len()
            );
        }
        entries.insert(key, CacheEntry::new(payload, self.ttl));
    }

    pub fn insert_typed<T: Serialize>(&self, key: String, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.insert(key, value),
            Err(e) => log::warn!("Failed to serialize cache entry '{}': {}", key, e),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
