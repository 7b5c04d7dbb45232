use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use nodewatch_engine::{Node, Snapshot};

use crate::main_lib::AppState;

async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.engine.snapshot())
}

async fn get_nodes(State(state): State<Arc<AppState>>) -> Json<Vec<Node>> {
    Json(state.engine.snapshot().nodes)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/snapshot", get(get_snapshot))
        .route("/nodes", get(get_nodes))
}
