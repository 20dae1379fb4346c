// src/state/store.rs
//! Concurrent repository collection
//!
//! All mutation funnels through [`RepositoryStore::upsert`] and
//! [`RepositoryStore::delete`] so identity resolution, source URL
//! backfill and persistence scheduling behave the same whether a record
//! arrives from a live fetch or from the cache file at startup. Readers
//! get cloned snapshots with the outdated flag recomputed against the
//! current collection; the backing map is never exposed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metrics::ServiceMetrics;
use crate::state::persist::DebouncedWriter;
use crate::state::record::{RepoKey, RepositoryRecord};

type RecordMap = BTreeMap<RepoKey, RepositoryRecord>;

/// Shared collection of repository records, keyed by identity
pub struct RepositoryStore {
    records: Arc<RwLock<RecordMap>>,
    /// Bumped on every mutation; lets the JSON render cache skip
    /// re-serializing an unchanged collection
    version: AtomicU64,
    writer: Option<DebouncedWriter>,
}

impl RepositoryStore {
    /// Create a store with no backing file. Used in tests and by tools
    /// that only need the in-memory collection.
    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            version: AtomicU64::new(0),
            writer: None,
        }
    }

    /// Create a store that persists to `path` after each quiet period
    pub fn persistent(path: PathBuf, quiet_period: Duration, metrics: Arc<ServiceMetrics>) -> Self {
        let records = Arc::new(RwLock::new(BTreeMap::new()));

        let snapshot_source = records.clone();
        let writer = DebouncedWriter::spawn("repositories", path, quiet_period, metrics, move || {
            let records = snapshot_source.read();
            let snapshot = listed_with_flags(&records);
            Ok(serde_json::to_vec_pretty(&snapshot)?)
        });

        Self {
            records,
            version: AtomicU64::new(0),
            writer: Some(writer),
        }
    }

    /// Insert or replace the record matching `record`'s identity key
    ///
    /// Backfills the canonical source URL from a download link when the
    /// record arrives without one. Replacement is wholesale; there is no
    /// field-level merge.
    pub fn upsert(&self, mut record: RepositoryRecord) {
        if record.repo_url.as_deref().unwrap_or("").is_empty() {
            record.repo_url = record.derive_repo_url();
        }

        let key = record.key();
        let displaced_origin = {
            let mut records = self.records.write();
            let displaced = records
                .get(&key)
                .map(|existing| existing.origin.repository_url.clone())
                .filter(|previous| *previous != record.origin.repository_url);
            records.insert(key.clone(), record);
            displaced
        };

        if let Some(previous) = displaced_origin {
            warn!(
                "Repository '{}' re-upserted from a different origin (was '{}'), keeping the new record",
                key, previous
            );
        }

        self.mark_changed();
    }

    /// Remove the record with the given identity key
    ///
    /// Returns whether a record was removed. A miss is a no-op: no
    /// version bump, no persistence write.
    pub fn delete(&self, key: &RepoKey) -> bool {
        let removed = self.records.write().remove(key).is_some();
        if removed {
            self.mark_changed();
        }
        removed
    }

    /// Snapshot of every record, outdated flags freshly recomputed
    pub fn get_all(&self) -> Vec<RepositoryRecord> {
        let records = self.records.read();
        listed_with_flags(&records)
    }

    /// Records last fetched from the given origin URL
    pub fn get_by_origin_url(&self, url: &str) -> Vec<RepositoryRecord> {
        self.get_all()
            .into_iter()
            .filter(|record| record.origin.repository_url == url)
            .collect()
    }

    /// Find the record produced by the release poll for `owner/repo`
    ///
    /// Public plugins link straight to `github.com/{owner/repo}`; private
    /// ones link through the service's own download proxy, so the match
    /// runs against whichever download link is authoritative.
    pub fn get_by_release_repo_name(
        &self,
        repo_name: &str,
        private: bool,
        app_url: &str,
    ) -> Option<RepositoryRecord> {
        let needle = if private {
            format!("{}/download/{}", app_url, repo_name)
        } else {
            format!("github.com/{}", repo_name)
        };

        self.get_all().into_iter().find(|record| {
            record
                .available_download_link()
                .is_some_and(|link| link.contains(&needle))
        })
    }

    /// Monotonic counter bumped on every successful mutation
    pub fn collection_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Most recent refresh timestamp among records from this origin URL
    pub fn last_refreshed_at(&self, origin_url: &str) -> Option<i64> {
        self.records
            .read()
            .values()
            .filter(|record| record.origin.repository_url == origin_url)
            .map(|record| record.origin.last_updated_at)
            .max()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Records produced by the GitHub release path
    pub fn internal_count(&self) -> usize {
        self.records
            .read()
            .values()
            .filter(|record| record.origin.is_internal_plugin == Some(true))
            .count()
    }

    /// Replay the cached collection from disk through the upsert path
    ///
    /// A missing file is a fresh install, not an error.
    pub fn load_cached(&self, path: &Path) -> Result<usize> {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cached repository data at {}", path.display());
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let records: Vec<RepositoryRecord> = serde_json::from_slice(&content)?;
        let count = records.len();
        for record in records {
            self.upsert(record);
        }

        info!("Loaded {} cached repository records from {}", count, path.display());
        Ok(count)
    }

    /// Force any pending snapshot to disk and wait for it to land
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    // Mutation committed and lock released; now wake the read caches
    // and the persistence timer.
    fn mark_changed(&self) {
        self.version.fetch_add(1, Ordering::Release);
        if let Some(writer) = &self.writer {
            writer.notify_dirty();
        }
    }
}

/// Clone the collection in key order with outdated flags recomputed
///
/// A record is outdated iff it declares an API level and that level
/// differs from the maximum level present anywhere in the collection.
fn listed_with_flags(records: &RecordMap) -> Vec<RepositoryRecord> {
    let max_level = records.values().filter_map(|record| record.api_level).max();

    records
        .values()
        .map(|record| {
            let mut record = record.clone();
            record.is_outdated = match (record.api_level, max_level) {
                (Some(level), Some(max)) => level != max,
                _ => false,
            };
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::record::OriginInfo;

    fn record(name: &str, author: &str, api_level: Option<i64>) -> RepositoryRecord {
        RepositoryRecord {
            name: name.into(),
            author: author.into(),
            internal_name: name.into(),
            api_level,
            ..Default::default()
        }
    }

    fn record_from_origin(name: &str, origin_url: &str, last_updated_at: i64) -> RepositoryRecord {
        RepositoryRecord {
            name: name.into(),
            author: "tester".into(),
            internal_name: name.into(),
            origin: OriginInfo {
                repository_url: origin_url.into(),
                last_updated_at,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_replaces_matching_identity() {
        let store = RepositoryStore::in_memory();

        let mut first = record("Sample", "acme", Some(9));
        first.description = "first".into();
        store.upsert(first);

        let mut second = record("Sample", "acme", Some(9));
        second.description = "second".into();
        store.upsert(second);

        let all = store.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description, "second");
    }

    #[test]
    fn test_upsert_backfills_repo_url() {
        let store = RepositoryStore::in_memory();

        let mut rec = record("Sample", "acme", None);
        rec.download_link_update =
            Some("https://github.com/acme/plugin/releases/download/v1/x.zip".into());
        store.upsert(rec);

        let all = store.get_all();
        assert_eq!(
            all[0].repo_url.as_deref(),
            Some("https://github.com/acme/plugin")
        );
    }

    #[test]
    fn test_upsert_keeps_existing_repo_url() {
        let store = RepositoryStore::in_memory();

        let mut rec = record("Sample", "acme", None);
        rec.repo_url = Some("https://example.com/custom".into());
        rec.download_link_install = Some("https://github.com/acme/plugin/raw/x.zip".into());
        store.upsert(rec);

        assert_eq!(
            store.get_all()[0].repo_url.as_deref(),
            Some("https://example.com/custom")
        );
    }

    #[test]
    fn test_delete_miss_is_silent() {
        let store = RepositoryStore::in_memory();
        store.upsert(record("Sample", "acme", None));
        let version = store.collection_version();

        let missing = RepoKey {
            name: "Other".into(),
            author: "acme".into(),
            internal_name: "Other".into(),
        };
        assert!(!store.delete(&missing));
        assert_eq!(store.collection_version(), version);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_bumps_version() {
        let store = RepositoryStore::in_memory();
        let rec = record("Sample", "acme", None);
        let key = rec.key();
        store.upsert(rec);

        let version = store.collection_version();
        assert!(store.delete(&key));
        assert_eq!(store.collection_version(), version + 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_outdated_all_equal_levels() {
        let store = RepositoryStore::in_memory();
        store.upsert(record("A", "x", Some(9)));
        store.upsert(record("B", "y", Some(9)));

        assert!(store.get_all().iter().all(|r| !r.is_outdated));
    }

    #[test]
    fn test_outdated_all_distinct_levels() {
        let store = RepositoryStore::in_memory();
        store.upsert(record("A", "x", Some(7)));
        store.upsert(record("B", "y", Some(8)));
        store.upsert(record("C", "z", Some(9)));

        let all = store.get_all();
        let outdated: Vec<bool> = all.iter().map(|r| r.is_outdated).collect();
        let current: Vec<&str> = all
            .iter()
            .filter(|r| !r.is_outdated)
            .map(|r| r.name.as_str())
            .collect();

        assert_eq!(outdated.iter().filter(|o| **o).count(), 2);
        assert_eq!(current, vec!["C"]);
    }

    #[test]
    fn test_outdated_single_record_and_missing_levels() {
        let store = RepositoryStore::in_memory();
        store.upsert(record("A", "x", Some(3)));
        assert!(!store.get_all()[0].is_outdated);

        // Records without a level are never outdated, even next to newer ones
        store.upsert(record("B", "y", None));
        store.upsert(record("C", "z", Some(9)));

        for rec in store.get_all() {
            match rec.name.as_str() {
                "A" => assert!(rec.is_outdated),
                "B" => assert!(!rec.is_outdated),
                "C" => assert!(!rec.is_outdated),
                other => panic!("unexpected record {other}"),
            }
        }
    }

    #[test]
    fn test_outdated_recomputed_after_delete() {
        let store = RepositoryStore::in_memory();
        let newest = record("B", "y", Some(9));
        let newest_key = newest.key();
        store.upsert(record("A", "x", Some(8)));
        store.upsert(newest);

        assert!(store.get_all().iter().any(|r| r.is_outdated));

        store.delete(&newest_key);
        // A is the maximum again
        assert!(store.get_all().iter().all(|r| !r.is_outdated));
    }

    #[test]
    fn test_get_by_origin_url() {
        let store = RepositoryStore::in_memory();
        store.upsert(record_from_origin("A", "https://one.example.com", 100));
        store.upsert(record_from_origin("B", "https://two.example.com", 100));
        store.upsert(record_from_origin("C", "https://one.example.com", 100));

        let one = store.get_by_origin_url("https://one.example.com");
        assert_eq!(one.len(), 2);
        assert!(store.get_by_origin_url("https://nowhere.example.com").is_empty());
    }

    #[test]
    fn test_get_by_release_repo_name() {
        let store = RepositoryStore::in_memory();

        let mut public = record("Sample", "acme", None);
        public.download_link_install =
            Some("https://github.com/acme/sample/releases/download/v1/sample.zip".into());
        store.upsert(public);

        let mut private = record("Secret", "acme", None);
        private.download_link_install =
            Some("https://listing.example.com/download/acme/secret/v2/secret.zip".into());
        store.upsert(private);

        let found = store
            .get_by_release_repo_name("acme/sample", false, "https://listing.example.com")
            .unwrap();
        assert_eq!(found.name, "Sample");

        let found = store
            .get_by_release_repo_name("acme/secret", true, "https://listing.example.com")
            .unwrap();
        assert_eq!(found.name, "Secret");

        assert!(store
            .get_by_release_repo_name("acme/unknown", false, "https://listing.example.com")
            .is_none());
    }

    #[test]
    fn test_last_refreshed_at() {
        let store = RepositoryStore::in_memory();
        store.upsert(record_from_origin("A", "https://one.example.com", 100));
        store.upsert(record_from_origin("B", "https://one.example.com", 250));

        assert_eq!(store.last_refreshed_at("https://one.example.com"), Some(250));
        assert_eq!(store.last_refreshed_at("https://two.example.com"), None);
    }

    #[tokio::test]
    async fn test_persistent_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached-repositories.json");
        let metrics = Arc::new(ServiceMetrics::new());

        let store = RepositoryStore::persistent(
            path.clone(),
            Duration::from_millis(10),
            metrics.clone(),
        );
        store.upsert(record("Sample", "acme", Some(9)));
        store.flush().await;

        let reloaded = RepositoryStore::in_memory();
        assert_eq!(reloaded.load_cached(&path).unwrap(), 1);
        assert_eq!(reloaded.get_all()[0].name, "Sample");
    }

    #[tokio::test]
    async fn test_load_cached_missing_file_is_fresh_install() {
        let dir = tempfile::tempdir().unwrap();
        let store = RepositoryStore::in_memory();
        assert_eq!(store.load_cached(&dir.path().join("absent.json")).unwrap(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers_and_readers() {
        let store = Arc::new(RepositoryStore::in_memory());
        let writers = 8;
        let per_writer = 50;

        let mut handles = Vec::new();
        for w in 0..writers {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..per_writer {
                    store.upsert(record(
                        &format!("plugin-{w}-{i}"),
                        &format!("author-{w}"),
                        Some((i % 5) as i64),
                    ));
                }
            }));
        }
        for _ in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    let snapshot = store.get_all();
                    assert!(snapshot.len() <= writers * per_writer);
                    tokio::task::yield_now().await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), writers * per_writer);
    }
}
