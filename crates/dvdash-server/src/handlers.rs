//! HTTP handlers for the dashboard endpoints.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::server::AppState;
use crate::sse;

#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub backfill: bool,
}

/// `GET /stream`: server-sent events for one dashboard client.
pub async fn stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> impl IntoResponse {
    let (subscription, backfill) = state.dashboard.subscribe_with_backfill();
    tracing::info!(
        subscriber_id = %subscription.id(),
        backfill = params.backfill,
        history_len = backfill.history.len(),
        "Stream client connected"
    );

    let events = sse::client_stream(subscription, backfill, params.backfill);
    Sse::new(events).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(state.keep_alive_secs.max(1))),
    )
}

/// `GET /history`: the backfill buffer, oldest first.
pub async fn history(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dashboard.history())
}

/// `GET /status`: the latest status snapshot.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dashboard.latest_status())
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let dashboard = &state.dashboard;
    let metrics = dashboard
        .metrics()
        .map(|m| m.snapshot())
        .unwrap_or_default();

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "callSign": state.call_sign.as_deref(),
        "subscribers": dashboard.subscriber_count(),
        "openSessions": dashboard.open_sessions().len(),
        "historyLen": dashboard.history_len(),
        "metrics": metrics,
    }))
}
