//! Client for the external "similar items" metadata service.
//!
//! Wraps the remote lookups (similar artists/tracks, artist and album info,
//! top albums, fallback artist pictures) with a TTL cache and a rate gate.
//! Remote failures never escape: callers get empty data instead.

pub mod cache;
pub mod client;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheEntry, ResponseCache};
pub use client::MetadataClient;
pub use error::MetadataError;
pub use models::{AlbumInfo, ArtistInfo, ImageCandidate, SimilarItemEntry, TopAlbum};
pub use rate_limit::RateGate;
pub use transport::{LastFmTransport, MetadataTransport};
