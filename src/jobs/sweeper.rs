// src/jobs/sweeper.rs
//! Expiry sweeper for stale repository records
//!
//! A record lives as long as its origin keeps refreshing it. Whether the
//! origin is still registered does not matter: staleness alone expires.

use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::metrics::ServiceMetrics;
use crate::state::RepositoryStore;

/// Delete every record whose origin has not refreshed within `ttl`
///
/// Returns the number of records removed.
pub fn sweep_expired(store: &RepositoryStore, ttl: Duration, metrics: &ServiceMetrics) -> usize {
    let cutoff = Utc::now().timestamp() - ttl.as_secs() as i64;
    let mut removed = 0;

    for record in store.get_all() {
        if record.origin.last_updated_at >= cutoff {
            continue;
        }

        info!(
            "Deleting expired repository '{}' by {} (origin {})",
            record.name, record.author, record.origin.repository_url
        );

        if store.delete(&record.key()) {
            metrics.record_expired();
            removed += 1;
        }
    }

    if removed > 0 {
        info!("Expired {} stale repository records", removed);
    }
    removed
}
