//! Read-only view of the caller's own library, used to drop recommendations
//! the user already has.
//!
//! The catalog itself lives outside this crate; the engine only asks for
//! point-in-time ownership snapshots through [`ReferenceCatalog`].

use parking_lot::RwLock;
use std::collections::HashSet;

/// Separator between artist and title in a composite key.
pub const KEY_SEPARATOR: char = '\u{0}';

/// Normalize a name for case-insensitive comparison.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Build the `artist\0title` lowercase key used for album and track ownership.
pub fn composite_key(artist: &str, title: &str) -> String {
    format!("{}{}{}", normalize(artist), KEY_SEPARATOR, normalize(title))
}

pub trait ReferenceCatalog: Send + Sync {
    /// Lowercased names of every artist in the catalog.
    fn artist_names(&self) -> HashSet<String>;

    /// Composite keys (see [`composite_key`]) of every album.
    fn album_keys(&self) -> HashSet<String>;

    /// Composite keys of every track.
    fn track_keys(&self) -> HashSet<String>;
}

/// Simple catalog held in memory, for embedding and tests.
#[derive(Default)]
pub struct InMemoryCatalog {
    artists: RwLock<HashSet<String>>,
    albums: RwLock<HashSet<String>>,
    tracks: RwLock<HashSet<String>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_artist(&self, name: &str) {
        self.artists.write().insert(normalize(name));
    }

    pub fn add_album(&self, artist: &str, title: &str) {
        self.albums.write().insert(composite_key(artist, title));
    }

    pub fn add_track(&self, artist: &str, title: &str) {
        self.tracks.write().insert(composite_key(artist, title));
    }

    pub fn with_artists<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.add_artist(name.as_ref());
        }
        self
    }
}

impl ReferenceCatalog for InMemoryCatalog {
    fn artist_names(&self) -> HashSet<String> {
        self.artists.read().clone()
    }

    fn album_keys(&self) -> HashSet<String> {
        self.albums.read().clone()
    }

    fn track_keys(&self) -> HashSet<String> {
        self.tracks.read().clone()
    }
}
