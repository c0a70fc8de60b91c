use axum::{Json, Router, extract::State, routing::get};
use tracing::info;
use validator::Validate;

use crate::{dto::tournament::TournamentLabelBody, error::AppError, state::SharedState};

/// Tournament settings read by the notification path.
pub fn router() -> Router<SharedState> {
    Router::new().route("/api/tournament/label", get(label).put(set_label))
}

/// Label currently attached to webhook notifications.
#[utoipa::path(
    get,
    path = "/api/tournament/label",
    tag = "tournament",
    responses((status = 200, description = "Current label", body = TournamentLabelBody))
)]
pub async fn label(State(state): State<SharedState>) -> Json<TournamentLabelBody> {
    Json(TournamentLabelBody {
        label: state.tournament_label().get(),
    })
}

/// Replace the label; notifications sent from now on carry the new value.
#[utoipa::path(
    put,
    path = "/api/tournament/label",
    tag = "tournament",
    request_body = TournamentLabelBody,
    responses(
        (status = 200, description = "Label updated", body = TournamentLabelBody),
        (status = 400, description = "Empty or oversized label")
    )
)]
pub async fn set_label(
    State(state): State<SharedState>,
    Json(body): Json<TournamentLabelBody>,
) -> Result<Json<TournamentLabelBody>, AppError> {
    body.validate()?;
    state.tournament_label().set(body.label.clone());
    info!(label = %body.label, "tournament label updated");
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::{
        config::{AppConfig, WebhookSettings},
        services::test_support::{memory_state_with, spawn_webhook},
    };

    #[tokio::test]
    async fn new_label_reaches_next_notification() {
        let (url, received) = spawn_webhook(StatusCode::OK).await;
        let (state, _) = memory_state_with(AppConfig {
            webhook: WebhookSettings {
                url: Some(url),
                timeout: std::time::Duration::from_secs(2),
            },
            ..AppConfig::default()
        })
        .await;

        let body = TournamentLabelBody {
            label: "Beach Finals".into(),
        };
        set_label(State(state.clone()), Json(body)).await.unwrap();
        assert_eq!(label(State(state.clone())).await.0.label, "Beach Finals");

        state.notifier().send_start(1, None).await;
        assert_eq!(received.lock().unwrap()[0]["tournamentLabel"], "Beach Finals");
    }

    #[tokio::test]
    async fn empty_label_is_rejected() {
        let (state, _) = memory_state_with(AppConfig::default()).await;
        let body = TournamentLabelBody { label: String::new() };
        assert!(set_label(State(state.clone()), Json(body)).await.is_err());
        assert_eq!(state.tournament_label().get(), AppConfig::default().tournament_label);
    }
}
