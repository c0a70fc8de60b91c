use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dao::models::CourtId,
    error::AppError,
    services::{match_service::ensure_court_id, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/courts/{court_id}",
    tag = "viewers",
    params(("court_id" = u32, Path, description = "Court identifier")),
    responses((status = 200, description = "Score updates of one court", content_type = "text/event-stream", body = String))
)]
/// Stream the live score of a court.
pub async fn court_stream(
    State(state): State<SharedState>,
    Path(court_id): Path<CourtId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    ensure_court_id(&state, court_id)?;
    info!(court_id, "new court SSE connection");
    let subscription = sse_service::subscribe(&state, court_id).await;
    Ok(sse_service::to_sse_stream(subscription))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/courts/{court_id}", get(court_stream))
}
