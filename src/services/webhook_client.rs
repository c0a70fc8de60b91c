//! Single-shot notifications to the operations hub.

use std::time::{Duration, SystemTime};

use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::{TournamentLabel, WebhookSettings},
    dao::models::CourtId,
    dto::{court::NotificationOutcome, format_system_time},
};

/// Sent in place of a missing external match identifier.
pub const MISSING_MATCH_ID: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
enum MatchEvent {
    Start,
    Stop,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    court: CourtId,
    time: String,
    event: MatchEvent,
    #[serde(rename = "matchID")]
    match_id: &'a str,
    #[serde(rename = "tournamentLabel")]
    tournament_label: String,
}

/// Best-effort webhook notifier: one attempt, bounded timeout, failures are
/// reported in the outcome and logged, never returned as errors.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: Option<String>,
    timeout: Duration,
    label: TournamentLabel,
}

impl WebhookNotifier {
    /// Notifier posting to `settings.url`; the label is read on every send.
    pub fn new(http: Client, settings: WebhookSettings, label: TournamentLabel) -> Self {
        Self {
            http,
            url: settings.url,
            timeout: settings.timeout,
            label,
        }
    }

    /// Label handle shared with whoever configures the tournament.
    pub fn tournament_label(&self) -> &TournamentLabel {
        &self.label
    }

    /// Announce that a match started on `court`.
    pub async fn send_start(
        &self,
        court_id: CourtId,
        external_match_id: Option<&str>,
    ) -> NotificationOutcome {
        self.send(MatchEvent::Start, court_id, external_match_id)
            .await
    }

    /// Announce that the match on `court` ended.
    pub async fn send_end(
        &self,
        court_id: CourtId,
        external_match_id: Option<&str>,
    ) -> NotificationOutcome {
        self.send(MatchEvent::Stop, court_id, external_match_id)
            .await
    }

    async fn send(
        &self,
        event: MatchEvent,
        court_id: CourtId,
        external_match_id: Option<&str>,
    ) -> NotificationOutcome {
        let Some(url) = self.url.as_deref() else {
            return NotificationOutcome {
                delivered: false,
                message: "webhook not configured".into(),
            };
        };

        let payload = WebhookPayload {
            court: court_id,
            time: format_system_time(SystemTime::now()),
            event,
            match_id: external_match_id
                .filter(|id| !id.is_empty())
                .unwrap_or(MISSING_MATCH_ID),
            tournament_label: self.label.get(),
        };

        let result = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => {
                info!(court_id, event = ?event, match_id = payload.match_id, "webhook delivered");
                NotificationOutcome {
                    delivered: true,
                    message: format!("{event:?} webhook sent"),
                }
            }
            Err(err) => {
                warn!(court_id, event = ?event, error = %err, "webhook delivery failed");
                NotificationOutcome {
                    delivered: false,
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::services::test_support::{spawn_silent_endpoint, spawn_webhook};

    fn notifier(url: String, label: &TournamentLabel) -> WebhookNotifier {
        WebhookNotifier::new(
            Client::new(),
            WebhookSettings {
                url: Some(url),
                timeout: Duration::from_secs(2),
            },
            label.clone(),
        )
    }

    #[tokio::test]
    async fn payload_uses_sentinel_and_current_label() {
        let (url, received) = spawn_webhook(StatusCode::OK).await;
        let label = TournamentLabel::new("Spring Cup");
        let notifier = notifier(url, &label);

        label.set("Summer Cup");
        let outcome = notifier.send_end(9, None).await;

        assert!(outcome.delivered);
        let body = received.lock().unwrap().pop().unwrap();
        assert_eq!(body["court"], 9);
        assert_eq!(body["event"], "Stop");
        assert_eq!(body["matchID"], MISSING_MATCH_ID);
        assert_eq!(body["tournamentLabel"], "Summer Cup");
    }

    #[tokio::test]
    async fn server_error_is_reported_once_without_retry() {
        let (url, received) = spawn_webhook(StatusCode::INTERNAL_SERVER_ERROR).await;
        let notifier = notifier(url, &TournamentLabel::new("Cup"));

        let outcome = notifier.send_start(3, Some("M-17")).await;

        assert!(!outcome.delivered);
        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["matchID"], "M-17");
    }

    #[tokio::test]
    async fn unreachable_hub_does_not_error() {
        let notifier = notifier("http://127.0.0.1:9/hook".into(), &TournamentLabel::new("Cup"));
        assert!(!notifier.send_start(1, None).await.delivered);
    }

    #[tokio::test]
    async fn silent_hub_is_abandoned_after_timeout() {
        let url = format!("{}/hook", spawn_silent_endpoint().await);
        let notifier = WebhookNotifier::new(
            Client::new(),
            WebhookSettings {
                url: Some(url),
                timeout: Duration::from_millis(200),
            },
            TournamentLabel::new("Cup"),
        );

        let started = tokio::time::Instant::now();
        let outcome = notifier.send_end(4, Some("M-4")).await;

        assert!(!outcome.delivered);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
