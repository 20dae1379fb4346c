// src/server/handlers/listing.rs
//! The aggregated listing endpoint

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::server::{render, SharedState};

/// GET /
///
/// The full listing. JSON by default; clients whose Accept header asks
/// for `text/html` get the rendered page instead. A failed page render
/// falls back to the JSON body rather than erroring out.
pub async fn get_listing(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let wants_html = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));

    if wants_html {
        match render::render_html(&state.template_path, &state.repositories, &state.registry).await
        {
            Ok(page) => {
                state.metrics.record_html_render();
                return (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    page,
                )
                    .into_response();
            }
            Err(e) => {
                warn!("Failed to render HTML listing, falling back to JSON: {}", e);
            }
        }
    }

    json_listing(&state)
}

pub(in crate::server) fn json_listing(state: &SharedState) -> Response {
    match state.render.listing_json(&state.repositories, &state.metrics) {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "application/json")],
            axum::body::Body::from(bytes),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to serialize listing: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to serialize listing",
            )
                .into_response()
        }
    }
}
