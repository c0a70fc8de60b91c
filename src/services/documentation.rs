use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for Courtside Live.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::score::increment,
        crate::routes::score::decrement,
        crate::routes::score::reset_set,
        crate::routes::score::swap_sides,
        crate::routes::score::confirm_set_win,
        crate::routes::score::current,
        crate::routes::court::advance_to_next_match,
        crate::routes::court::upcoming_matches,
        crate::routes::court::match_logs,
        crate::routes::sse::court_stream,
        crate::routes::tournament::label,
        crate::routes::tournament::set_label,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::score::ScoreUpdatePayload,
            crate::dto::score::PointRequest,
            crate::dto::score::CourtRequest,
            crate::dto::score::ConfirmSetResponse,
            crate::dto::court::AdvanceResponse,
            crate::dto::court::AdvanceReport,
            crate::dto::court::ActuatorOutcome,
            crate::dto::court::NotificationOutcome,
            crate::dto::court::MatchSummary,
            crate::dto::court::MatchLogSummary,
            crate::dto::tournament::TournamentLabelBody,
            crate::dto::ws::ViewerInboundMessage,
            crate::dto::ws::ViewerOutboundMessage,
            crate::state::score_engine::Team,
            crate::state::set_history::SetScore,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "score", description = "Point scoring on the current match of a court"),
        (name = "court", description = "Court lifecycle and match queue"),
        (name = "viewers", description = "Live score streams for viewers"),
        (name = "tournament", description = "Tournament settings"),
    )
)]
pub struct ApiDoc;
