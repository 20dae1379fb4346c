// src/server/handlers/search.rs
//! Prefix search over the listing
//!
//! Both routes share one contract: lowercase the query, strip surrounding
//! slashes and a `.json` suffix (clients habitually append one), then
//! prefix-match case-insensitively. An empty result is a 404 with a fixed
//! JSON body that existing clients pattern-match on.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::info;

use crate::server::SharedState;
use crate::state::RepositoryRecord;

const NO_MATCH_BODY: &str =
    r#"{"status": 404, "reason": "No plugin(s) matching with the given search parameter were found"}"#;

/// GET /plugins/:name
pub async fn by_internal_name(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Response {
    render_search(&state, &name, |record, query| {
        record.internal_name.to_lowercase().starts_with(query)
    })
}

/// GET /authors/:author
pub async fn by_author(State(state): State<SharedState>, Path(author): Path<String>) -> Response {
    render_search(&state, &author, |record, query| {
        record.author.to_lowercase().starts_with(query)
    })
}

fn render_search<F>(state: &SharedState, raw: &str, matches: F) -> Response
where
    F: Fn(&RepositoryRecord, &str) -> bool,
{
    let query = normalize_query(raw);
    state.metrics.record_search();
    info!("Handling search request for '{}'", query);

    let results: Vec<RepositoryRecord> = state
        .repositories
        .get_all()
        .into_iter()
        .filter(|record| matches(record, &query))
        .collect();

    if results.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/json")],
            NO_MATCH_BODY,
        )
            .into_response();
    }

    Json(results).into_response()
}

fn normalize_query(raw: &str) -> String {
    let query = raw.to_lowercase();
    let query = query.trim_matches('/');
    query.strip_suffix(".json").unwrap_or(query).to_string()
}
