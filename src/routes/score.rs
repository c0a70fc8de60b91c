use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dao::models::CourtId,
    dto::score::{ConfirmSetResponse, CourtRequest, PointRequest, ScoreUpdatePayload},
    error::AppError,
    services::score_service,
    state::SharedState,
};

/// Scoring endpoints driven by court operators.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/score/increment", post(increment))
        .route("/api/score/decrement", post(decrement))
        .route("/api/score/resetSet", post(reset_set))
        .route("/api/score/swapSides", post(swap_sides))
        .route("/api/score/confirmSetWin", post(confirm_set_win))
        .route("/api/score/current/{court_id}", get(current))
}

/// Add a point to a team on the court's current match.
#[utoipa::path(
    post,
    path = "/api/score/increment",
    tag = "score",
    request_body = PointRequest,
    responses(
        (status = 200, description = "Updated snapshot", body = ScoreUpdatePayload),
        (status = 404, description = "Court, match or score state not found"),
        (status = 409, description = "Match completed or no longer current"),
        (status = 503, description = "Storage unavailable, retry")
    )
)]
pub async fn increment(
    State(state): State<SharedState>,
    Json(payload): Json<PointRequest>,
) -> Result<Json<ScoreUpdatePayload>, AppError> {
    Ok(Json(score_service::increment_point(&state, payload).await?))
}

/// Remove a point from a team, never below zero.
#[utoipa::path(
    post,
    path = "/api/score/decrement",
    tag = "score",
    request_body = PointRequest,
    responses(
        (status = 200, description = "Updated snapshot", body = ScoreUpdatePayload),
        (status = 404, description = "Court, match or score state not found"),
        (status = 409, description = "Match completed or no longer current")
    )
)]
pub async fn decrement(
    State(state): State<SharedState>,
    Json(payload): Json<PointRequest>,
) -> Result<Json<ScoreUpdatePayload>, AppError> {
    Ok(Json(score_service::decrement_point(&state, payload).await?))
}

/// Zero both scores of the current set.
#[utoipa::path(
    post,
    path = "/api/score/resetSet",
    tag = "score",
    request_body = CourtRequest,
    responses((status = 200, description = "Updated snapshot", body = ScoreUpdatePayload))
)]
pub async fn reset_set(
    State(state): State<SharedState>,
    Json(payload): Json<CourtRequest>,
) -> Result<Json<ScoreUpdatePayload>, AppError> {
    Ok(Json(score_service::reset_current_set(&state, payload).await?))
}

/// Exchange team names, sets and points.
#[utoipa::path(
    post,
    path = "/api/score/swapSides",
    tag = "score",
    request_body = CourtRequest,
    responses((status = 200, description = "Updated snapshot", body = ScoreUpdatePayload))
)]
pub async fn swap_sides(
    State(state): State<SharedState>,
    Json(payload): Json<CourtRequest>,
) -> Result<Json<ScoreUpdatePayload>, AppError> {
    Ok(Json(score_service::swap_sides(&state, payload).await?))
}

/// Confirm the pending set win, if any.
#[utoipa::path(
    post,
    path = "/api/score/confirmSetWin",
    tag = "score",
    request_body = CourtRequest,
    responses((status = 200, description = "Confirmation result", body = ConfirmSetResponse))
)]
pub async fn confirm_set_win(
    State(state): State<SharedState>,
    Json(payload): Json<CourtRequest>,
) -> Result<Json<ConfirmSetResponse>, AppError> {
    Ok(Json(score_service::confirm_set_win(&state, payload).await?))
}

/// Current snapshot of a court, read from durable state.
#[utoipa::path(
    get,
    path = "/api/score/current/{court_id}",
    tag = "score",
    params(("court_id" = u32, Path, description = "Court identifier")),
    responses(
        (status = 200, description = "Current snapshot", body = ScoreUpdatePayload),
        (status = 404, description = "Court has no current match")
    )
)]
pub async fn current(
    State(state): State<SharedState>,
    Path(court_id): Path<CourtId>,
) -> Result<Json<ScoreUpdatePayload>, AppError> {
    Ok(Json(score_service::current_snapshot(&state, court_id).await?))
}
