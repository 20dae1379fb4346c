// tests/common/mod.rs

//! Shared fixtures for the integration tests.

use std::sync::Arc;

use async_trait::async_trait;
use plugin_listing::fetch::{ManifestFetcher, ReleaseFetcher};
use plugin_listing::jobs::JobContext;
use plugin_listing::metrics::ServiceMetrics;
use plugin_listing::state::{
    PluginRelease, Registry, ReleaseAsset, ReleaseStore, RepositoryRecord, RepositoryStore,
};
use plugin_listing::Result;

/// A manifest fetcher that serves the same records for every origin.
pub struct CannedManifests(pub Vec<RepositoryRecord>);

#[async_trait]
impl ManifestFetcher for CannedManifests {
    async fn fetch_records(&self, _url: &str) -> Result<Vec<RepositoryRecord>> {
        Ok(self.0.clone())
    }
}

/// A release fetcher that serves one fixed release list and manifest record.
pub struct CannedReleases {
    pub releases: Vec<PluginRelease>,
    pub record: RepositoryRecord,
}

#[async_trait]
impl ReleaseFetcher for CannedReleases {
    async fn fetch_releases(&self, _repo_name: &str) -> Result<Vec<PluginRelease>> {
        Ok(self.releases.clone())
    }

    async fn fetch_record(
        &self,
        _repo_name: &str,
        _asset: &ReleaseAsset,
        _private: bool,
    ) -> Result<RepositoryRecord> {
        Ok(self.record.clone())
    }
}

pub fn record(name: &str, author: &str) -> RepositoryRecord {
    RepositoryRecord {
        name: name.into(),
        author: author.into(),
        internal_name: name.into(),
        description: format!("{name} does things"),
        ..Default::default()
    }
}

/// A release carrying the manifest and archive assets the resolver expects.
pub fn release(tag: &str, downloads: i64) -> PluginRelease {
    PluginRelease {
        url: format!("https://api.github.com/repos/acme/tool/releases/{tag}"),
        tag_name: tag.into(),
        body: format!("Release notes for {tag}"),
        created_at: "2024-05-01T12:00:00Z".into(),
        assets: vec![
            ReleaseAsset {
                url: "https://api.github.com/repos/acme/tool/releases/assets/1".into(),
                name: "Tool.json".into(),
                content_type: "application/json".into(),
                browser_download_url: format!(
                    "https://github.com/acme/tool/releases/download/{tag}/Tool.json"
                ),
                download_count: 0,
            },
            ReleaseAsset {
                url: "https://api.github.com/repos/acme/tool/releases/assets/2".into(),
                name: "Tool.zip".into(),
                content_type: "application/zip".into(),
                browser_download_url: format!(
                    "https://github.com/acme/tool/releases/download/{tag}/Tool.zip"
                ),
                download_count: downloads,
            },
        ],
        ..Default::default()
    }
}

/// In-memory job context over one origin and one public internal plugin.
pub fn job_context(
    registry: Registry,
    manifests: CannedManifests,
    github: CannedReleases,
) -> JobContext {
    let registry = Arc::new(registry);
    JobContext {
        repositories: Arc::new(RepositoryStore::in_memory()),
        releases: Arc::new(ReleaseStore::in_memory(registry.clone())),
        registry,
        manifests: Arc::new(manifests),
        github: Arc::new(github),
        metrics: Arc::new(ServiceMetrics::new()),
        app_url: "https://listing.example.com".into(),
    }
}
