use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::error::MetadataError;
use super::models::check_api_error;
use crate::config::RecommenderConfig;

/// Raw access to the metadata service.
///
/// Implementations only move bytes and surface errors; caching, throttling
/// and typed parsing live in [`super::MetadataClient`].
#[async_trait]
pub trait MetadataTransport: Send + Sync {
    /// Whether a credential is available. Without one the pipeline refuses to run.
    fn has_credential(&self) -> bool;

    /// Call a service method (e.g. `artist.getsimilar`) and return the JSON body.
    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, MetadataError>;

    /// Look up an artist picture from the secondary image service.
    ///
    /// `Ok(None)` means the service answered and had nothing usable.
    async fn artist_image(&self, artist: &str) -> Result<Option<String>, MetadataError>;
}

/// Marker in Deezer's default artist picture URL (no image uploaded).
const DEEZER_EMPTY_PICTURE_MARKER: &str = "/images/artist//";

/// HTTP transport for the Last.fm web API, with Deezer as the image fallback.
pub struct LastFmTransport {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    image_base_url: String,
}

impl LastFmTransport {
    pub fn new(config: &RecommenderConfig) -> Result<Self, MetadataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("recommender/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key: config
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            base_url: config.api_base_url.clone(),
            image_base_url: config.fallback_image_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, url: reqwest::Url) -> Result<Value, MetadataError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        let text = response
            .text()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        if !status.is_success() {
            log::debug!("Request failed ({}) at {}", status, url.path());
            return Err(MetadataError::Status(status.as_u16()));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl MetadataTransport for LastFmTransport {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, MetadataError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(MetadataError::MissingCredential)?;

        let mut query: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 4);
        query.push(("method", method));
        query.extend_from_slice(params);
        query.push(("autocorrect", "1"));
        query.push(("api_key", api_key));
        query.push(("format", "json"));

        let url = reqwest::Url::parse_with_params(&self.base_url, &query)
            .map_err(|e| MetadataError::Network(format!("URL parse error: {}", e)))?;

        log::debug!("Calling {} ({} params)", method, params.len());

        let data = self.get_json(url).await?;
        check_api_error(&data)?;
        Ok(data)
    }

    async fn artist_image(&self, artist: &str) -> Result<Option<String>, MetadataError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search/artist", self.image_base_url),
            &[("q", artist), ("limit", "1")],
        )
        .map_err(|e| MetadataError::Network(format!("URL parse error: {}", e)))?;

        let data = self.get_json(url).await?;
        Ok(parse_deezer_picture(&data, artist))
    }
}

/// Pick the best picture of the first result, if the names agree.
fn parse_deezer_picture(data: &Value, artist: &str) -> Option<String> {
    let first = data.get("data")?.as_array()?.first()?;

    let name = first.get("name")?.as_str()?;
    if !name.trim().eq_ignore_ascii_case(artist.trim()) {
        return None;
    }

    ["picture_xl", "picture_big", "picture_medium"]
        .iter()
        .filter_map(|key| first.get(*key).and_then(|v| v.as_str()))
        .find(|url| !url.is_empty() && !url.contains(DEEZER_EMPTY_PICTURE_MARKER))
        .map(|url| url.to_string())
}
