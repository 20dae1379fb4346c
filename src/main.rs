// src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use plugin_listing::config::ListingConfig;
use plugin_listing::fetch::{GitHubClient, HttpManifestFetcher};
use plugin_listing::jobs::{self, JobContext, Scheduler};
use plugin_listing::metrics::ServiceMetrics;
use plugin_listing::server::{run_server, RenderCache, ServerState};
use plugin_listing::state::{Registry, ReleaseStore, RepositoryStore};

#[derive(Parser)]
#[command(name = "plugin-listing")]
#[command(author, version, about = "Aggregates plugin manifests and GitHub releases into a single queryable listing", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (defaults apply without one)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ListingConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ListingConfig::default(),
    };
    config.validate().context("Invalid configuration")?;

    let timings = config.timings().context("Invalid scheduler timings")?;
    let bind_addr = config.bind_addr().context("Invalid bind address")?;
    let app_url = config.app_url();

    std::fs::create_dir_all(&config.storage.root).with_context(|| {
        format!(
            "Failed to create state directory {}",
            config.storage.root.display()
        )
    })?;

    // Registration inputs
    let mut registry = Registry::new();
    let origins = registry
        .load_origins(&config.origins_path())
        .context("Failed to load the origin registry")?;
    let plugins = registry
        .load_plugins(&config.plugins_path())
        .context("Failed to load the plugin registry")?;
    info!("Registered {} origins and {} internal plugins", origins, plugins);
    let registry = Arc::new(registry);

    let metrics = Arc::new(ServiceMetrics::new());

    // Stores, warmed from the cache files before anything fetches
    let repositories = Arc::new(RepositoryStore::persistent(
        config.repositories_path(),
        timings.quiet_period,
        metrics.clone(),
    ));
    match repositories.load_cached(&config.repositories_path()) {
        Ok(count) => info!("Loaded {} cached repository records", count),
        Err(e) => warn!("Could not load cached repository records: {}", e),
    }

    let releases = Arc::new(ReleaseStore::persistent(
        registry.clone(),
        config.releases_path(),
        timings.quiet_period,
        metrics.clone(),
    ));
    match releases.load_cached(&config.releases_path()) {
        Ok(count) => info!("Loaded cached releases for {} plugins", count),
        Err(e) => warn!("Could not load cached release metadata: {}", e),
    }

    // Fetchers
    let token = config.github_token();
    if token.is_none() {
        warn!("No GitHub token configured; private plugin downloads will fail");
    }
    let github = Arc::new(GitHubClient::new(token).context("Failed to create GitHub client")?);
    let manifests =
        Arc::new(HttpManifestFetcher::new().context("Failed to create manifest fetcher")?);

    // One scheduled task per origin and per plugin, plus the sweeper
    let scheduler = Arc::new(Scheduler::new());
    let ctx = JobContext {
        repositories: repositories.clone(),
        releases: releases.clone(),
        registry: registry.clone(),
        manifests,
        github: github.clone(),
        metrics: metrics.clone(),
        app_url: app_url.clone(),
    };
    jobs::register_all(&scheduler, &ctx, &timings)
        .context("Failed to register scheduled tasks")?;

    let state = Arc::new(ServerState {
        repositories: repositories.clone(),
        releases: releases.clone(),
        registry,
        scheduler: scheduler.clone(),
        github,
        metrics,
        render: RenderCache::new(),
        app_url,
        template_path: config.template_path(),
        assets_dir: config.assets_path(),
    });

    run_server(state, bind_addr, shutdown_signal()).await?;

    // Drain on the way out: stop the tasks, then get both caches to disk.
    scheduler.shutdown();
    let flushed = tokio::time::timeout(timings.shutdown_grace, async {
        repositories.flush().await;
        releases.flush().await;
    })
    .await;
    if flushed.is_err() {
        warn!(
            "State flush did not finish within {}s, exiting anyway",
            timings.shutdown_grace.as_secs()
        );
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to listen for the shutdown signal, serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
