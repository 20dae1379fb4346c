// src/server/mod.rs
//! HTTP surface of the listing service
//!
//! Serves the aggregated listing as JSON or HTML, prefix search over it,
//! release changelogs, the private-asset download proxy, the GitHub
//! release webhook and a metrics snapshot. Handlers only read the shared
//! stores; every mutation goes through the scheduled jobs.

mod handlers;
mod render;
mod routes;

pub use render::RenderCache;
pub use routes::create_router;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::fetch::GitHubClient;
use crate::jobs::Scheduler;
use crate::metrics::ServiceMetrics;
use crate::state::{Registry, ReleaseStore, RepositoryStore};

/// Shared server state
pub struct ServerState {
    pub repositories: Arc<RepositoryStore>,
    pub releases: Arc<ReleaseStore>,
    pub registry: Arc<Registry>,
    pub scheduler: Arc<Scheduler>,
    pub github: Arc<GitHubClient>,
    pub metrics: Arc<ServiceMetrics>,
    pub render: RenderCache,
    /// Public base URL, no trailing slash
    pub app_url: String,
    pub template_path: PathBuf,
    pub assets_dir: PathBuf,
}

pub type SharedState = Arc<ServerState>;

/// Start the listing server and serve until `shutdown` resolves
pub async fn run_server(
    state: SharedState,
    bind_addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    info!("Starting listing server on {}", bind_addr);
    info!(
        "Serving {} records from {} origins and {} internal plugins",
        state.repositories.len(),
        state.registry.origin_count(),
        state.registry.plugin_count()
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Listing server is ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
