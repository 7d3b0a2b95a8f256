pub mod dashboard;
pub mod health;
pub mod readings;

use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(readings::router())
                .merge(dashboard::router()),
        )
        .with_state(state)
}
