use serde::Serialize;
use thiserror::Error;

/// Errors from the saved-items store.
///
/// "Already saved" and "not found" are outcomes, not errors; see
/// `SaveOutcome` and `DeleteOutcome`.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Too many keys in one check: {0} (max {1})")]
    TooManyKeys(usize, usize),

    #[error("User identity is empty")]
    InvalidUser,

    #[error("Store operation cancelled")]
    Cancelled,
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Database(format!("Serialization error: {}", e))
    }
}
