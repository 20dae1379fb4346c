// src/fetch/github.rs
//! GitHub releases API client
//!
//! Covers the three calls the service makes against GitHub: listing a
//! repository's releases, downloading a release-attached manifest, and
//! streaming a private release asset for the download proxy. Private
//! assets must go through the API asset URL with the token and
//! `Accept: application/octet-stream`; their browser URLs 404.

use async_trait::async_trait;
use reqwest::header;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fetch::{strip_trailing_commas, ReleaseFetcher};
use crate::state::{PluginRelease, ReleaseAsset, RepositoryRecord};

const API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub struct GitHubClient {
    client: reqwest::Client,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("plugin-listing/0.1")
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, token })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Open a streaming download of a release asset
    ///
    /// The caller owns the response: status inspection, header
    /// passthrough and body streaming all happen at the HTTP layer.
    pub async fn stream_asset(&self, asset_url: &str) -> Result<reqwest::Response> {
        let Some(token) = &self.token else {
            return Err(Error::Config(
                "No GitHub token configured for private asset downloads".to_string(),
            ));
        };

        self.client
            .get(asset_url)
            .header(header::ACCEPT, "application/octet-stream")
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Fetch {
                source_id: asset_url.to_string(),
                reason: e.to_string(),
            })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ReleaseFetcher for GitHubClient {
    async fn fetch_releases(&self, repo_name: &str) -> Result<Vec<PluginRelease>> {
        let url = format!("{}/repos/{}/releases?per_page=100", API_BASE, repo_name);
        debug!("Fetching releases for {}", repo_name);

        let request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json");

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::Fetch {
                source_id: repo_name.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::Fetch {
                source_id: repo_name.to_string(),
                reason: format!("GitHub returned HTTP {}", response.status()),
            });
        }

        let body = response.text().await.map_err(|e| Error::Fetch {
            source_id: repo_name.to_string(),
            reason: e.to_string(),
        })?;

        decode_releases(&body, repo_name)
    }

    async fn fetch_record(
        &self,
        repo_name: &str,
        asset: &ReleaseAsset,
        private: bool,
    ) -> Result<RepositoryRecord> {
        let request = if private {
            self.authorize(
                self.client
                    .get(&asset.url)
                    .header(header::ACCEPT, "application/octet-stream"),
            )
        } else {
            self.client.get(&asset.browser_download_url)
        };

        let response = request.send().await.map_err(|e| Error::Fetch {
            source_id: repo_name.to_string(),
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(Error::Fetch {
                source_id: repo_name.to_string(),
                reason: format!("manifest asset returned HTTP {}", response.status()),
            });
        }

        let body = response.text().await.map_err(|e| Error::Fetch {
            source_id: repo_name.to_string(),
            reason: e.to_string(),
        })?;

        let sanitized = strip_trailing_commas(&body);
        serde_json::from_str(&sanitized).map_err(|e| Error::Decode {
            source_id: repo_name.to_string(),
            reason: e.to_string(),
        })
    }
}

fn decode_releases(body: &str, source_id: &str) -> Result<Vec<PluginRelease>> {
    let sanitized = strip_trailing_commas(body);
    serde_json::from_str(&sanitized).map_err(|e| Error::Decode {
        source_id: source_id.to_string(),
        reason: e.to_string(),
    })
}
