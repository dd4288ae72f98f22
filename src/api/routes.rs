//! API route definitions.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use crate::analysis::activity;
use crate::refresh;

const DEFAULT_PER_PAGE: usize = 20;
const MAX_PER_PAGE: usize = 100;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(latest_stats))
        .route("/stats/refresh", post(refresh_stats))
        .route("/activity", get(list_activity))
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn latest_stats(State(state): State<AppState>) -> Json<Value> {
    match state.store.latest().await {
        Some(snapshot) => Json(json!({
            "data": snapshot.stats,
            "meta": { "generated_at": snapshot.stats.generated_at.to_rfc3339() }
        })),
        None => Json(json!({ "data": null, "meta": { "message": "no statistics computed yet" } })),
    }
}

async fn refresh_stats(State(state): State<AppState>) -> Json<Value> {
    let snapshot = refresh::refresh_once(&state.service, &state.store).await;
    Json(json!({
        "data": snapshot.stats,
        "meta": { "generated_at": snapshot.stats.generated_at.to_rfc3339() }
    }))
}

#[derive(Debug, Deserialize)]
struct ActivityQuery {
    page: Option<usize>,
    per_page: Option<usize>,
}

async fn list_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Json<Value> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);

    let Some(snapshot) = state.store.latest().await else {
        return Json(json!({ "data": [], "meta": { "total": 0, "page": page, "per_page": per_page } }));
    };

    let entries = activity::window(&snapshot.activity, page, per_page);
    Json(json!({
        "data": entries,
        "meta": {
            "total": snapshot.activity.len(),
            "page": page,
            "per_page": per_page
        }
    }))
}
