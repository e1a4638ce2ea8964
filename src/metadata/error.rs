use thiserror::Error;

/// Failures talking to the metadata service.
///
/// These never leave the client: every variant is logged and turned into
/// "no data" before reaching the pipeline.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(u16),

    /// The service answered 200 but carried an `error` code in the body.
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("No API key configured")]
    MissingCredential,

    #[error("Request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for MetadataError {
    fn from(err: reqwest::Error) -> Self {
        MetadataError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        MetadataError::Malformed(err.to_string())
    }
}
