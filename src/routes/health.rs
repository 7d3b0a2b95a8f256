use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

use crate::stats::{IngestStats, IngestStatsSnapshot};
use crate::state::AppState;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub ingest: IngestStatsSnapshot,
}

pub(crate) async fn healthz_handler(State(stats): State<Arc<IngestStats>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        ingest: stats.snapshot(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz_handler))
}
