// tests/refresh_jobs.rs

//! Scheduled refresh flows, end to end: origin manifests and internal
//! plugin releases land in the stores, startup runs respect freshness,
//! and webhook kicks re-run a plugin's task out of band.

mod common;

use std::time::Duration;

use chrono::Utc;
use plugin_listing::config::SchedulerTimings;
use plugin_listing::jobs::{register_all, Scheduler, SWEEPER_KEY};
use plugin_listing::state::{OriginInfo, Registry};

const ORIGIN_URL: &str = "https://plugins.example.com/manifest.json";

/// Hour-long intervals so only startup runs and explicit kicks fire.
fn slow_timings() -> SchedulerTimings {
    SchedulerTimings {
        quiet_period: Duration::from_millis(20),
        origin_interval_min: Duration::from_secs(3600),
        origin_interval_max: Duration::from_secs(3600),
        origin_staleness: Duration::from_secs(1800),
        release_interval: Duration::from_secs(3600),
        release_staleness: Duration::from_secs(1800),
        sweep_interval: Duration::from_secs(3600),
        repository_ttl: Duration::from_secs(3 * 24 * 3600),
        shutdown_grace: Duration::from_secs(10),
    }
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.add_origin(ORIGIN_URL).unwrap();
    registry.add_plugin("acme/tool", false).unwrap();
    registry
}

#[tokio::test]
async fn test_startup_refresh_populates_stores() {
    let ctx = common::job_context(
        registry(),
        common::CannedManifests(vec![
            common::record("One", "origin-author"),
            common::record("Two", "origin-author"),
        ]),
        common::CannedReleases {
            releases: vec![common::release("v1.1.0", 7), common::release("v1.0.0", 5)],
            record: common::record("ToolPlugin", "Acme"),
        },
    );

    let scheduler = Scheduler::new();
    register_all(&scheduler, &ctx, &slow_timings()).unwrap();

    assert_eq!(scheduler.task_count(), 3);
    assert!(scheduler.is_registered(ORIGIN_URL));
    assert!(scheduler.is_registered("acme/tool"));
    assert!(scheduler.is_registered(SWEEPER_KEY));

    // Empty stores mean every source is stale, so startup runs fire
    tokio::time::sleep(Duration::from_millis(200)).await;

    let records = ctx.repositories.get_all();
    assert_eq!(records.len(), 3);

    let plugin_record = records
        .iter()
        .find(|record| record.name == "ToolPlugin")
        .expect("plugin record should be listed");
    assert_eq!(
        plugin_record.repo_url.as_deref(),
        Some("https://github.com/acme/tool")
    );
    assert_eq!(
        plugin_record.download_link_install.as_deref(),
        Some("https://github.com/acme/tool/releases/download/v1.1.0/Tool.zip")
    );
    assert_eq!(plugin_record.download_count, Some(12));
    assert_eq!(plugin_record.last_update, Some(1714564800));
    assert_eq!(plugin_record.origin.is_internal_plugin, Some(true));
    assert_eq!(plugin_record.origin.is_private_plugin, None);

    let cached = ctx.releases.get_releases("acme/tool").unwrap();
    assert_eq!(cached.len(), 2);

    let snapshot = ctx.metrics.snapshot();
    assert_eq!(snapshot.manifest_fetches, 1);
    assert_eq!(snapshot.release_fetches, 1);
    assert_eq!(snapshot.records_upserted, 3);

    scheduler.shutdown();
}

#[tokio::test]
async fn test_fresh_state_skips_startup_runs() {
    let ctx = common::job_context(
        registry(),
        common::CannedManifests(vec![common::record("One", "origin-author")]),
        common::CannedReleases {
            releases: vec![common::release("v1.0.0", 5)],
            record: common::record("ToolPlugin", "Acme"),
        },
    );

    // Both sources were refreshed moments ago
    let now = Utc::now().timestamp();
    let mut origin_record = common::record("Cached", "origin-author");
    origin_record.origin = OriginInfo {
        repository_url: ORIGIN_URL.into(),
        last_updated_at: now,
        ..Default::default()
    };
    ctx.repositories.upsert(origin_record);

    let mut plugin_record = common::record("ToolPlugin", "Acme");
    plugin_record.origin = OriginInfo {
        repository_url: "https://github.com/acme/tool".into(),
        last_updated_at: now,
        is_internal_plugin: Some(true),
        ..Default::default()
    };
    ctx.repositories.upsert(plugin_record);

    let scheduler = Scheduler::new();
    register_all(&scheduler, &ctx, &slow_timings()).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let snapshot = ctx.metrics.snapshot();
    assert_eq!(snapshot.manifest_fetches, 0);
    assert_eq!(snapshot.release_fetches, 0);

    scheduler.shutdown();
}

#[tokio::test]
async fn test_kick_reruns_plugin_refresh() {
    let ctx = common::job_context(
        registry(),
        common::CannedManifests(Vec::new()),
        common::CannedReleases {
            releases: vec![common::release("v1.0.0", 5)],
            record: common::record("ToolPlugin", "Acme"),
        },
    );

    let scheduler = Scheduler::new();
    register_all(&scheduler, &ctx, &slow_timings()).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(ctx.metrics.snapshot().release_fetches, 1);

    // The webhook path: one out-of-band run, no new registration
    assert!(scheduler.run_now("acme/tool", Duration::ZERO));
    tokio::time::sleep(Duration::from_millis(150)).await;

    let snapshot = ctx.metrics.snapshot();
    assert_eq!(snapshot.release_fetches, 2);
    // Identical release payload, so the second run upserts nothing new
    assert_eq!(snapshot.records_upserted, 1);

    assert!(!scheduler.run_now("acme/unknown", Duration::ZERO));

    scheduler.shutdown();
}
