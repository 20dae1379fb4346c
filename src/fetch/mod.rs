// src/fetch/mod.rs
//! Fetcher seams for origin manifests and GitHub releases
//!
//! The update jobs only see these traits, so tests drive them with
//! canned fetchers and the HTTP implementations stay thin: request,
//! sanitize, decode. Several real origins publish JSON with trailing
//! commas, so every payload runs through the sanitizer before decoding.

mod github;
mod manifest;

pub use github::GitHubClient;
pub use manifest::HttpManifestFetcher;

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::Result;
use crate::state::{PluginRelease, ReleaseAsset, RepositoryRecord};

/// Fetches a manifest origin URL and decodes its record list
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch_records(&self, url: &str) -> Result<Vec<RepositoryRecord>>;
}

/// Fetches release metadata and release-attached manifests from GitHub
#[async_trait]
pub trait ReleaseFetcher: Send + Sync {
    /// Recent releases for `owner/repo`, newest first
    async fn fetch_releases(&self, repo_name: &str) -> Result<Vec<PluginRelease>>;

    /// Download and decode the record manifest attached to a release
    ///
    /// Private assets go through the API URL with the token; public ones
    /// use the plain browser download URL.
    async fn fetch_record(
        &self,
        repo_name: &str,
        asset: &ReleaseAsset,
        private: bool,
    ) -> Result<RepositoryRecord>;
}

/// Drop commas that directly precede a closing brace or bracket
pub(crate) fn strip_trailing_commas(body: &str) -> String {
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING_COMMA.get_or_init(|| Regex::new(r",(\s*[\}\]])").unwrap());
    re.replace_all(body, "$1").into_owned()
}
