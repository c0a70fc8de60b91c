use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use crate::{
    dao::models::CourtId,
    dto::court::{AdvanceResponse, MatchLogSummary, MatchSummary, UpcomingQuery},
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Court lifecycle endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/court/{court_id}/advanceToNextMatch",
            post(advance_to_next_match),
        )
        .route("/api/court/{court_id}/upcomingMatches", get(upcoming_matches))
        .route("/api/logs/matches", get(match_logs))
}

/// Bind the next pending match of the court.
///
/// Answers `already_in_progress` without changing anything while the current
/// match is still being played.
#[utoipa::path(
    post,
    path = "/api/court/{court_id}/advanceToNextMatch",
    tag = "court",
    params(("court_id" = u32, Path, description = "Court identifier")),
    responses(
        (status = 200, description = "Advance result", body = AdvanceResponse),
        (status = 404, description = "Court unknown or no pending match"),
        (status = 503, description = "Storage unavailable, retry")
    )
)]
pub async fn advance_to_next_match(
    State(state): State<SharedState>,
    Path(court_id): Path<CourtId>,
) -> Result<Json<AdvanceResponse>, AppError> {
    Ok(Json(match_service::advance(&state, court_id).await?))
}

/// Pending matches of the court in play order.
#[utoipa::path(
    get,
    path = "/api/court/{court_id}/upcomingMatches",
    tag = "court",
    params(("court_id" = u32, Path, description = "Court identifier"), UpcomingQuery),
    responses((status = 200, description = "Upcoming matches", body = [MatchSummary]))
)]
pub async fn upcoming_matches(
    State(state): State<SharedState>,
    Path(court_id): Path<CourtId>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Vec<MatchSummary>>, AppError> {
    Ok(Json(
        match_service::upcoming_matches(&state, court_id, query.limit).await?,
    ))
}

/// Match logs ordered by start time.
#[utoipa::path(
    get,
    path = "/api/logs/matches",
    tag = "court",
    responses((status = 200, description = "Match logs", body = [MatchLogSummary]))
)]
pub async fn match_logs(
    State(state): State<SharedState>,
) -> Result<Json<Vec<MatchLogSummary>>, AppError> {
    Ok(Json(match_service::match_logs(&state).await?))
}
