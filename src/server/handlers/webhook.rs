// src/server/handlers/webhook.rs
//! GitHub release webhook
//!
//! Publishing a release on an internal plugin repository pings this
//! endpoint. The handler never fetches anything itself: it kicks the
//! plugin's scheduled task with a short delay so GitHub has time to
//! finish publishing the release assets, then answers immediately.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use crate::server::SharedState;

const WEBHOOK_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Deserialize)]
pub struct ReleaseWebhook {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub repository: WebhookRepository,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookRepository {
    #[serde(default)]
    pub full_name: String,
}

/// POST /webhook/github-release
pub async fn github_release(
    State(state): State<SharedState>,
    Json(payload): Json<ReleaseWebhook>,
) -> StatusCode {
    let full_name = payload.repository.full_name;

    if state.scheduler.run_now(&full_name, WEBHOOK_DELAY) {
        state.metrics.record_webhook_accepted();
        info!(
            "Accepted release webhook for {} (action: {}), refresh in {}s",
            full_name,
            payload.action.as_deref().unwrap_or("unknown"),
            WEBHOOK_DELAY.as_secs()
        );
        StatusCode::ACCEPTED
    } else {
        state.metrics.record_webhook_unknown();
        warn!("Release webhook for unregistered repository {}", full_name);
        StatusCode::NOT_FOUND
    }
}
