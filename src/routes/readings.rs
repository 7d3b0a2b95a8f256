use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::{bad_request, ValidationError};
use crate::ingest::{IngestRequest, Reading, ReadingIngestor};
use crate::state::AppState;
use crate::stats::IngestStats;

/// Bodies the JSON extractor cannot map onto a reading count as rejected readings.
pub(crate) async fn create_reading(
    State(ingestor): State<ReadingIngestor>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>), (StatusCode, String)> {
    let Json(payload) = payload.map_err(|rejection| {
        IngestStats::bump(&ingestor.stats().rejected);
        bad_request(ValidationError::MalformedBody(rejection.body_text()))
    })?;
    let reading = ingestor.ingest(payload).await.map_err(bad_request)?;
    Ok((StatusCode::CREATED, Json(reading)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/readings", post(create_reading))
}
