// SPDX-License-Identifier: MIT OR Apache-2.0
//! `/health/live`, `/health/ready`, `/metrics` (spec §6).

use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

pub async fn live() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // The in-memory Store/Cache/EventLog are never "not yet connected";
    // readiness degrades only when the Event Log itself reports trouble,
    // which surfaces to callers as a 503 on the write path instead.
    let stats = state.broadcaster.stats();
    Json(json!({
        "status": "ok",
        "contract_version": titan_core::CONTRACT_VERSION,
        "active_subscribers": stats.active_subscribers,
    }))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.broadcaster.stats();
    let cache_len = state.cache.len().await;
    let body = format!(
        "# TYPE titan_broadcast_published_total counter\n\
         titan_broadcast_published_total {}\n\
         # TYPE titan_broadcast_lagged_total counter\n\
         titan_broadcast_lagged_total {}\n\
         # TYPE titan_broadcast_subscribers gauge\n\
         titan_broadcast_subscribers {}\n\
         # TYPE titan_cache_entries gauge\n\
         titan_cache_entries {}\n",
        stats.total_published, stats.total_lagged, stats.active_subscribers, cache_len,
    );
    ([("content-type", "text/plain; version=0.0.4")], body)
}
