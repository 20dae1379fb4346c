// src/server/handlers/stats.rs
//! Metrics snapshot endpoint

use axum::extract::State;
use axum::Json;

use crate::metrics::MetricsSnapshot;
use crate::server::SharedState;

/// GET /stats
pub async fn get_stats(State(state): State<SharedState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
