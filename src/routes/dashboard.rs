use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

use crate::dashboard::{Dashboard, MachinesOverview, SitesOverview};
use crate::state::AppState;

pub(crate) async fn machines(State(dashboard): State<Arc<Dashboard>>) -> Json<MachinesOverview> {
    Json(dashboard.machines_overview().await)
}

/// Fetches every site live; each degrades independently.
pub(crate) async fn sites(State(dashboard): State<Arc<Dashboard>>) -> Json<SitesOverview> {
    Json(dashboard.sites_overview().await)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/machines", get(machines))
        .route("/sites", get(sites))
}
