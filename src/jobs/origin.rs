// src/jobs/origin.rs
//! Refresh run for one manifest origin URL

use chrono::Utc;
use tracing::{debug, warn};

use crate::jobs::JobContext;
use crate::state::OriginInfo;

/// Fetch an origin's manifest list and upsert every record it publishes
///
/// Fetch and decode happen entirely before the store is touched. A
/// failed run leaves existing records alone; the next tick retries.
pub async fn refresh_origin(url: &str, ctx: &JobContext) {
    debug!("Refreshing repository origin {}", url);

    let records = match ctx.manifests.fetch_records(url).await {
        Ok(records) => {
            ctx.metrics.record_manifest_fetch();
            records
        }
        Err(e) => {
            warn!("Origin refresh failed for {}: {}", url, e);
            ctx.metrics.record_manifest_error();
            return;
        }
    };

    let now = Utc::now().timestamp();
    let count = records.len();

    for mut record in records {
        record.origin = OriginInfo {
            repository_url: url.to_string(),
            last_updated_at: now,
            is_internal_plugin: None,
            is_private_plugin: None,
        };
        ctx.repositories.upsert(record);
        ctx.metrics.record_upserted();
    }

    debug!("Origin {} yielded {} records", url, count);
}
