//! Kanban API — HTTP and WebSocket adapter over the board engine.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Builds the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::ws::router())
        .nest(
            "/api/v1",
            Router::new()
                .merge(routes::projects::router())
                .merge(routes::boards::router())
                .merge(routes::columns::router())
                .merge(routes::cards::router()),
        )
        .with_state(state)
}
