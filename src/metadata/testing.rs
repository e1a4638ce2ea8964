//! In-process stand-in for the metadata service, used by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::error::MetadataError;
use super::models::check_api_error;
use super::transport::MetadataTransport;

/// Answers calls from canned bodies keyed by `method:subject`, where the
/// subject is every non-`limit` parameter, lowercased and joined with `/`.
/// Every call is also logged with its full parameter list.
pub struct FakeTransport {
    responses: Mutex<HashMap<String, Value>>,
    images: Mutex<HashMap<String, Option<String>>>,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    offline: AtomicBool,
    credential: bool,
    delay: Option<Duration>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            images: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            credential: true,
            delay: None,
        }
    }

    pub fn without_credential() -> Self {
        Self {
            credential: false,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, method: &str, subject: &[&str], body: Value) {
        let subject = subject
            .iter()
            .map(|s| s.to_lowercase())
            .collect::<Vec<_>>()
            .join("/");
        self.responses
            .lock()
            .insert(format!("{}:{}", method, subject), body);
    }

    pub fn set_image(&self, artist: &str, url: Option<&str>) {
        self.images
            .lock()
            .insert(artist.to_lowercase(), url.map(str::to_string));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        let prefix = format!("{}:", method);
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    /// The `limit` sent with each call to `method`, in call order.
    pub fn limits_sent(&self, method: &str) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .filter_map(|(_, params)| {
                params
                    .iter()
                    .find(|(k, _)| k == "limit")
                    .map(|(_, v)| v.clone())
            })
            .collect()
    }

    async fn simulate_latency(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MetadataTransport for FakeTransport {
    fn has_credential(&self) -> bool {
        self.credential
    }

    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, MetadataError> {
        let subject = params
            .iter()
            .filter(|(k, _)| *k != "limit")
            .map(|(_, v)| v.trim().to_lowercase())
            .collect::<Vec<_>>()
            .join("/");
        let key = format!("{}:{}", method, subject);
        self.calls.lock().push(key.clone());
        self.requests.lock().push((
            method.to_string(),
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        self.simulate_latency().await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(MetadataError::Network("connection refused".to_string()));
        }

        let body = self
            .responses
            .lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| MetadataError::Api {
                code: 6,
                message: format!("no canned response for {}", key),
            })?;
        check_api_error(&body)?;
        Ok(body)
    }

    async fn artist_image(&self, artist: &str) -> Result<Option<String>, MetadataError> {
        let artist = artist.trim().to_lowercase();
        self.calls
            .lock()
            .push(format!("fallback.artistimage:{}", artist));
        self.simulate_latency().await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(MetadataError::Network("connection refused".to_string()));
        }
        Ok(self.images.lock().get(&artist).cloned().flatten())
    }
}
