use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::main_lib::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: i64,
    /// Whether the initial warm-up has finished.
    warm: bool,
}

async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0);
    Json(HealthResponse {
        status: "ok",
        uptime_secs,
        warm: state.engine.is_warm(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/healthz", get(healthz))
}
