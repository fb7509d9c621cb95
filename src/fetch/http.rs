//! HTTP fetcher for numeric values inside JSON documents
//!
//! `ureq` is a blocking client, so the request runs on the tokio
//! blocking pool. The transport timeout configured here belongs to the
//! fetcher; the cache itself never times a fetch out.

use super::{FetchError, Fetcher};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Fetches one numeric value out of a JSON document served over HTTP
///
/// The value is located with a JSON pointer, e.g. `/rates/VND` against
/// an exchange-rate document.
#[derive(Debug, Clone)]
pub struct JsonValueFetcher {
    url: String,
    pointer: String,
    timeout: Duration,
}

impl JsonValueFetcher {
    /// Create a fetcher for `url`, extracting the number at `pointer`
    pub fn new(url: impl Into<String>, pointer: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            pointer: pointer.into(),
            timeout,
        }
    }

    fn fetch_blocking(&self) -> Result<f64, FetchError> {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build()
            .into();

        let mut response = agent
            .get(&self.url)
            .call()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        extract_value(&body, &self.pointer)
    }
}

#[async_trait]
impl Fetcher<f64> for JsonValueFetcher {
    async fn fetch(&self) -> Result<f64, FetchError> {
        debug!(url = %self.url, "fetching rate document");

        let fetcher = self.clone();
        tokio::task::spawn_blocking(move || fetcher.fetch_blocking())
            .await
            .map_err(|_| FetchError::Aborted)?
    }
}

/// Parse `body` as JSON and read the number at `pointer`
fn extract_value(body: &str, pointer: &str) -> Result<f64, FetchError> {
    let document: serde_json::Value =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    document
        .pointer(pointer)
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| FetchError::Malformed(format!("no numeric value at {}", pointer)))
}
