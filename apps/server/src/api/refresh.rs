use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use nodewatch_engine::FetchOutcome;
use serde::Serialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    task: String,
    outcome: &'static str,
}

fn outcome_label(outcome: FetchOutcome) -> &'static str {
    match outcome {
        FetchOutcome::Committed => "committed",
        FetchOutcome::Cached => "cached",
        FetchOutcome::Disabled => "disabled",
    }
}

/// Run one on-demand invocation of a task and wait for it.
async fn refresh_task(
    Path(task): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<RefreshResponse>> {
    if !state.engine.has_task(&task) {
        return Err(ApiError::NotFound(format!("Unknown task '{}'", task)));
    }
    let outcome = state.engine.refresh_now(&task).await?;
    Ok(Json(RefreshResponse {
        task: task.to_uppercase(),
        outcome: outcome_label(outcome),
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/refresh/{task}", post(refresh_task))
}
