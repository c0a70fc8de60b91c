use axum::Router;

use crate::state::SharedState;

pub mod court;
pub mod docs;
pub mod health;
pub mod score;
pub mod sse;
pub mod tournament;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(score::router())
        .merge(court::router())
        .merge(sse::router())
        .merge(tournament::router())
        .merge(websocket::router())
        .merge(docs::router());

    api_router.with_state(state)
}
