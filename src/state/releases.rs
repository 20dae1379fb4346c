// src/state/releases.rs
//! Cached GitHub release metadata for internal plugins
//!
//! One entry per registered plugin, replaced wholesale on each fetch.
//! The upsert reports whether the new list differs from the cached one
//! so the update job can skip re-resolving a record when GitHub returned
//! the same releases it did last time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metrics::ServiceMetrics;
use crate::state::persist::DebouncedWriter;
use crate::state::registry::Registry;

/// One GitHub release, as returned by the releases API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginRelease {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub tag_name: String,

    #[serde(default)]
    pub draft: bool,

    #[serde(default)]
    pub prerelease: bool,

    /// Release notes, served as the changelog
    #[serde(default)]
    pub body: String,

    /// Publication timestamp, passed through as GitHub formats it
    #[serde(default)]
    pub created_at: String,

    #[serde(default, alias = "Assets")]
    pub assets: Vec<ReleaseAsset>,
}

impl PluginRelease {
    /// The plugin manifest attached to this release: a `.json` asset
    /// uploaded with an `application/json` content type
    pub fn manifest_asset(&self) -> Option<&ReleaseAsset> {
        self.assets
            .iter()
            .filter(|asset| {
                asset.name.contains(".json") && asset.content_type == "application/json"
            })
            .next_back()
    }

    /// The plugin archive attached to this release: any `.zip` asset
    pub fn archive_asset(&self) -> Option<&ReleaseAsset> {
        self.assets
            .iter()
            .filter(|asset| asset.name.contains(".zip"))
            .next_back()
    }
}

/// One downloadable file attached to a release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// API URL, the one that honors `Accept: application/octet-stream`
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub content_type: String,

    #[serde(default)]
    pub browser_download_url: String,

    #[serde(default)]
    pub download_count: i64,
}

/// Persisted cache entry: a plugin and its last-fetched release list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseContext {
    #[serde(rename = "RepositoryName")]
    pub repository_name: String,

    #[serde(rename = "Releases")]
    pub releases: Vec<PluginRelease>,
}

/// Per-plugin release cache with change detection
pub struct ReleaseStore {
    contexts: Arc<RwLock<BTreeMap<String, Vec<PluginRelease>>>>,
    registry: Arc<Registry>,
    writer: Option<DebouncedWriter>,
}

impl ReleaseStore {
    pub fn in_memory(registry: Arc<Registry>) -> Self {
        Self {
            contexts: Arc::new(RwLock::new(BTreeMap::new())),
            registry,
            writer: None,
        }
    }

    /// Create a store that persists to `path` after each quiet period
    pub fn persistent(
        registry: Arc<Registry>,
        path: PathBuf,
        quiet_period: Duration,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let contexts: Arc<RwLock<BTreeMap<String, Vec<PluginRelease>>>> =
            Arc::new(RwLock::new(BTreeMap::new()));

        let snapshot_source = contexts.clone();
        let writer = DebouncedWriter::spawn("releases", path, quiet_period, metrics, move || {
            let contexts = snapshot_source.read();
            let snapshot: Vec<ReleaseContext> = contexts
                .iter()
                .map(|(name, releases)| ReleaseContext {
                    repository_name: name.clone(),
                    releases: releases.clone(),
                })
                .collect();
            Ok(serde_json::to_vec_pretty(&snapshot)?)
        });

        Self {
            contexts,
            registry,
            writer: Some(writer),
        }
    }

    /// Replace the cached release list for a registered plugin
    ///
    /// Returns `true` when the new list differs from the cached one.
    /// Identical content is a no-op: nothing is persisted and the caller
    /// can skip its downstream work. Plugins that were never registered
    /// are refused — registration is closed after startup.
    pub fn upsert_releases(&self, repo_name: &str, releases: Vec<PluginRelease>) -> bool {
        let Some(plugin) = self.registry.plugin(repo_name) else {
            warn!("Refusing release metadata for unregistered plugin '{}'", repo_name);
            return false;
        };

        {
            let mut contexts = self.contexts.write();
            if contexts.get(&plugin.name).is_some_and(|cached| *cached == releases) {
                return false;
            }
            contexts.insert(plugin.name.clone(), releases);
        }

        if let Some(writer) = &self.writer {
            writer.notify_dirty();
        }
        true
    }

    /// Last-fetched release list for a plugin, newest first
    pub fn get_releases(&self, repo_name: &str) -> Option<Vec<PluginRelease>> {
        self.contexts.read().get(repo_name).cloned()
    }

    /// Replay the cached release lists from disk through the upsert path
    ///
    /// A missing file is a fresh install, not an error. Entries for
    /// plugins no longer in the registry are dropped with a warning.
    pub fn load_cached(&self, path: &Path) -> Result<usize> {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cached release data at {}", path.display());
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let contexts: Vec<ReleaseContext> = serde_json::from_slice(&content)?;
        let count = contexts.len();
        for context in contexts {
            self.upsert_releases(&context.repository_name, context.releases);
        }

        info!("Loaded {} cached release lists from {}", count, path.display());
        Ok(count)
    }

    /// Force any pending snapshot to disk and wait for it to land
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }
}

/// Proxy download URL for a private plugin's release asset
///
/// Private assets cannot be linked directly (GitHub requires the API
/// token), so records point at the service's own download route.
pub fn private_download_url(app_url: &str, repo_name: &str, tag: &str, asset_name: &str) -> String {
    format!(
        "{}/download/{}/{}/{}",
        app_url.trim().trim_end_matches('/'),
        repo_name,
        tag,
        asset_name
    )
}
