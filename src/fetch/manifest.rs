// src/fetch/manifest.rs
//! HTTP manifest fetcher for third-party origin URLs

use async_trait::async_trait;
use reqwest::header;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fetch::{strip_trailing_commas, ManifestFetcher};
use crate::state::RepositoryRecord;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Fetches origin URLs with reqwest and decodes their record arrays
pub struct HttpManifestFetcher {
    client: reqwest::Client,
}

impl HttpManifestFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("plugin-listing/0.1")
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch_records(&self, url: &str) -> Result<Vec<RepositoryRecord>> {
        debug!("Fetching manifest list from {}", url);

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::Fetch {
                source_id: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::Fetch {
                source_id: url.to_string(),
                reason: format!("origin returned HTTP {}", response.status()),
            });
        }

        let body = response.text().await.map_err(|e| Error::Fetch {
            source_id: url.to_string(),
            reason: e.to_string(),
        })?;

        decode_records(&body, url)
    }
}

/// Decode a manifest body, tolerating trailing commas
fn decode_records(body: &str, source_id: &str) -> Result<Vec<RepositoryRecord>> {
    let sanitized = strip_trailing_commas(body);
    serde_json::from_str(&sanitized).map_err(|e| Error::Decode {
        source_id: source_id.to_string(),
        reason: e.to_string(),
    })
}
