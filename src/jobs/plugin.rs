// src/jobs/plugin.rs
//! Refresh run for one internal plugin's GitHub releases
//!
//! Resolves the newest release into a repository record: download the
//! manifest asset, point the install/update links at the archive asset
//! (or at the download proxy for private plugins), and aggregate the
//! download count across every cached release.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::jobs::JobContext;
use crate::state::{private_download_url, InternalPlugin, OriginInfo};

pub async fn refresh_plugin(plugin: &InternalPlugin, ctx: &JobContext) {
    debug!("Refreshing releases for internal plugin {}", plugin.name);

    let releases = match ctx.github.fetch_releases(&plugin.name).await {
        Ok(releases) => {
            ctx.metrics.record_release_fetch();
            releases
        }
        Err(e) => {
            warn!("Release refresh failed for {}: {}", plugin.name, e);
            ctx.metrics.record_release_error();
            return;
        }
    };

    if releases.is_empty() {
        warn!("No releases found for {}", plugin.name);
        return;
    }

    let changed = ctx.releases.upsert_releases(&plugin.name, releases.clone());
    let existing = ctx
        .repositories
        .get_by_release_repo_name(&plugin.name, plugin.private, &ctx.app_url);
    if !changed && existing.is_some() {
        debug!("Releases for {} unchanged, record left as-is", plugin.name);
        return;
    }

    let latest = &releases[0];
    let (Some(manifest_asset), Some(archive_asset)) =
        (latest.manifest_asset(), latest.archive_asset())
    else {
        warn!(
            "Release {} of {} has no manifest or archive asset",
            latest.tag_name, plugin.name
        );
        return;
    };

    let mut record = match ctx
        .github
        .fetch_record(&plugin.name, manifest_asset, plugin.private)
        .await
    {
        Ok(record) => record,
        Err(e) => {
            warn!("Manifest asset fetch failed for {}: {}", plugin.name, e);
            ctx.metrics.record_release_error();
            return;
        }
    };

    let repo_url = format!("https://github.com/{}", plugin.name);
    let download_link = if plugin.private {
        private_download_url(&ctx.app_url, &plugin.name, &latest.tag_name, &archive_asset.name)
    } else {
        archive_asset.browser_download_url.clone()
    };

    let total_downloads: i64 = releases
        .iter()
        .flat_map(|release| release.assets.iter())
        .filter(|asset| asset.name.contains(".zip"))
        .map(|asset| asset.download_count)
        .sum();

    record.repo_url = Some(repo_url.clone());
    record.download_link_install = Some(download_link.clone());
    record.download_link_update = Some(download_link);
    record.download_count = Some(total_downloads);
    if let Ok(created_at) = DateTime::parse_from_rfc3339(&latest.created_at) {
        record.last_update = Some(created_at.timestamp());
    }
    record.origin = OriginInfo {
        repository_url: repo_url,
        last_updated_at: Utc::now().timestamp(),
        is_internal_plugin: Some(true),
        is_private_plugin: plugin.private.then_some(true),
    };

    ctx.repositories.upsert(record);
    ctx.metrics.record_upserted();
    info!("Updated release record for {} ({})", plugin.name, latest.tag_name);
}
