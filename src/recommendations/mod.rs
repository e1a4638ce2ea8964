//! Recommendation engine for music discovery.
//!
//! Asks the metadata service for artists, albums or tracks similar to a
//! seed, drops anything the caller's catalog already owns, then enriches
//! what is left with tags, images and outbound links.

pub mod engine;
pub mod errors;
pub mod images;
pub mod links;
pub mod types;

pub use engine::{EngineSettings, RecommendationEngine};
pub use errors::RecommendationError;
pub use types::{
    ExternalLinks, RecommendationRequest, RecommendationResult, RecommendationSet, ResultLimit,
};
