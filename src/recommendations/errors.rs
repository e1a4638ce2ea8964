//! Typed errors for the recommendation system.
//!
//! Uses `thiserror` for ergonomic error definitions and implements
//! `Serialize` so errors can be handed to a caller as structured JSON.
//! Remote failures are not represented here: they degrade to empty results.

use serde::Serialize;
use thiserror::Error;

use crate::models::EntityKind;

/// Errors that can occur during recommendation generation.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum RecommendationError {
    /// No credential for the metadata service; nothing can be fetched
    #[error("Metadata service API key is not configured")]
    MissingCredential,

    /// Requested result count is not one of the supported sizes
    #[error("Unsupported result limit {0} (expected 5, 8, 10 or 12)")]
    InvalidLimit(usize),

    /// Required identifying fields are missing from the request
    #[error("Invalid {0} request: {1}")]
    InvalidRequest(EntityKind, String),

    /// The request's cancellation token fired before a result was ready
    #[error("Recommendation request cancelled")]
    Cancelled,
}
