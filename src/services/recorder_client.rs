//! Start/stop commands for the recording device mounted on each court.

use std::time::SystemTime;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::RecorderSettings,
    dao::models::{CourtId, MatchId},
    dto::{court::ActuatorOutcome, format_system_time},
    services::retry::RetryPolicy,
};

/// Recorder command issued to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderCommand {
    Start,
    Stop,
}

impl RecorderCommand {
    fn path(self) -> &'static str {
        match self {
            RecorderCommand::Start => "start",
            RecorderCommand::Stop => "stop",
        }
    }
}

#[derive(Debug, Error)]
enum RecorderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("device-control API answered {0}")]
    Status(StatusCode),
    #[error("device reported failure: {0}")]
    Rejected(String),
}

#[derive(Debug, Serialize)]
struct RecorderRequest {
    court_id: CourtId,
    match_id: MatchId,
    timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecorderReply {
    status: Option<String>,
    success: Option<bool>,
    message: Option<String>,
}

impl RecorderReply {
    fn accepted(&self) -> bool {
        self.status.as_deref() == Some("ok") || self.success == Some(true)
    }
}

/// `{base}/api/v1/devices/{device}/recorder/{command}`, with the device id
/// encoded as a single path segment.
fn command_url(base_url: &str, device_id: &str, command: RecorderCommand) -> Result<Url, &'static str> {
    let mut url = Url::parse(base_url).map_err(|_| "device-control URL does not parse")?;
    url.path_segments_mut()
        .map_err(|_| "device-control URL cannot carry a path")?
        .pop_if_empty()
        .extend(["api", "v1", "devices", device_id, "recorder", command.path()]);
    Ok(url)
}

/// Retrying HTTP client for the device-control API. Never fails: every call
/// returns an [`ActuatorOutcome`].
#[derive(Clone)]
pub struct RecorderClient {
    http: Client,
    settings: RecorderSettings,
    policy: RetryPolicy,
}

impl RecorderClient {
    /// Client sharing `http`, retrying per `settings`.
    pub fn new(http: Client, settings: RecorderSettings) -> Self {
        let policy = RetryPolicy::linear(settings.max_attempts, settings.retry_step);
        Self {
            http,
            settings,
            policy,
        }
    }

    /// Ask the court device to start recording.
    pub async fn start(
        &self,
        court_id: CourtId,
        match_id: MatchId,
        device_id: Option<&str>,
    ) -> ActuatorOutcome {
        self.send(RecorderCommand::Start, court_id, match_id, device_id)
            .await
    }

    /// Ask the court device to stop recording.
    pub async fn stop(
        &self,
        court_id: CourtId,
        match_id: MatchId,
        device_id: Option<&str>,
    ) -> ActuatorOutcome {
        self.send(RecorderCommand::Stop, court_id, match_id, device_id)
            .await
    }

    async fn send(
        &self,
        command: RecorderCommand,
        court_id: CourtId,
        match_id: MatchId,
        device_id: Option<&str>,
    ) -> ActuatorOutcome {
        let Some(base_url) = self.settings.base_url.as_deref() else {
            return ActuatorOutcome::not_configured("no device-control URL");
        };
        let Some(device_id) = device_id.filter(|id| !id.is_empty()) else {
            return ActuatorOutcome::not_configured("no device assigned to the court");
        };

        let url = match command_url(base_url, device_id, command) {
            Ok(url) => url,
            Err(reason) => {
                warn!(court_id, match_id, base_url, reason, "invalid device-control URL");
                return ActuatorOutcome::not_configured(reason);
            }
        };
        let body = RecorderRequest {
            court_id,
            match_id,
            timestamp: format_system_time(SystemTime::now()),
        };

        let result = self
            .policy
            .run(|attempt| {
                let url = &url;
                let body = &body;
                async move {
                    let outcome = self.attempt(url, body).await;
                    if let Err(err) = &outcome {
                        warn!(court_id, match_id, attempt, error = %err, "recorder {} attempt failed", command.path());
                    }
                    outcome
                }
            })
            .await;

        match result {
            Ok((message, attempts)) => {
                info!(court_id, match_id, attempts, "recorder {} accepted", command.path());
                ActuatorOutcome {
                    success: true,
                    message,
                    attempts,
                }
            }
            Err(err) => ActuatorOutcome {
                success: false,
                message: format!(
                    "recorder {} failed after {} attempt(s): {}",
                    command.path(),
                    err.attempts,
                    err.last_error
                ),
                attempts: err.attempts,
            },
        }
    }

    async fn attempt(&self, url: &Url, body: &RecorderRequest) -> Result<String, RecorderError> {
        let mut request = self
            .http
            .post(url.clone())
            .timeout(self.settings.timeout)
            .json(body);
        if let Some(token) = self.settings.bearer_token.as_deref() {
            request = request.bearer_auth(token);
        }
        if let (Some(id), Some(secret)) = (
            self.settings.client_id.as_deref(),
            self.settings.client_secret.as_deref(),
        ) {
            request = request.query(&[("client_id", id), ("client_secret", secret)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecorderError::Status(status));
        }

        let reply = response
            .json::<RecorderReply>()
            .await
            .map_err(RecorderError::Transport)?;
        if reply.accepted() {
            Ok(reply.message.unwrap_or_else(|| "ok".into()))
        } else {
            Err(RecorderError::Rejected(
                reply
                    .message
                    .or(reply.status)
                    .unwrap_or_else(|| "no success marker in reply".into()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };

    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use serde_json::{Value, json};
    use tokio::{net::TcpListener, sync::Mutex, time::Instant};

    use super::*;
    use crate::services::test_support::spawn_silent_endpoint;

    async fn spawn_device(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn settings(base_url: String) -> RecorderSettings {
        RecorderSettings {
            base_url: Some(base_url),
            bearer_token: Some("secret-token".into()),
            client_id: Some("scoreboard".into()),
            client_secret: Some("hunter2".into()),
            timeout: Duration::from_secs(2),
            max_attempts: 3,
            retry_step: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn always_failing_device_gets_three_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/api/v1/devices/{device}/recorder/start",
                post(|State(calls): State<Arc<AtomicU32>>| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    StatusCode::BAD_GATEWAY
                }),
            )
            .with_state(calls.clone());
        let client = RecorderClient::new(Client::new(), settings(spawn_device(router).await));

        let outcome = client.start(5, 1, Some("cam-5")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(outcome.message.contains("502"));
    }

    #[tokio::test]
    async fn device_failing_once_succeeds_on_second_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/api/v1/devices/{device}/recorder/start",
                post(
                    |State(calls): State<Arc<AtomicU32>>,
                     headers: HeaderMap,
                     Query(query): Query<HashMap<String, String>>,
                     Json(body): Json<Value>| async move {
                        assert_eq!(
                            headers.get("authorization").unwrap(),
                            "Bearer secret-token"
                        );
                        assert_eq!(query["client_id"], "scoreboard");
                        assert_eq!(body["court_id"], 5);
                        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                            Json(json!({"status": "busy"}))
                        } else {
                            Json(json!({"status": "ok", "message": "recording"}))
                        }
                    },
                ),
            )
            .with_state(calls.clone());
        let client = RecorderClient::new(Client::new(), settings(spawn_device(router).await));

        let outcome = client.start(5, 1, Some("cam-5")).await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.message, "recording");
    }

    #[tokio::test]
    async fn missing_device_is_reported_without_calling_out() {
        let client = RecorderClient::new(
            Client::new(),
            settings("http://127.0.0.1:9".into()),
        );

        let outcome = client.stop(1, 1, None).await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 0);
        assert!(outcome.message.contains("not configured"));
    }

    #[tokio::test]
    async fn unresponsive_device_times_out_on_every_attempt() {
        let base_url = spawn_silent_endpoint().await;
        let client = RecorderClient::new(
            Client::new(),
            RecorderSettings {
                timeout: Duration::from_millis(200),
                ..settings(base_url)
            },
        );

        let started = Instant::now();
        let outcome = client.start(2, 4, Some("cam-2")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn device_id_stays_one_path_segment() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let router = Router::new()
            .route(
                "/api/v1/devices/{device}/recorder/stop",
                post(
                    |State(seen): State<Arc<Mutex<Vec<String>>>>,
                     Path(device): Path<String>| async move {
                        seen.lock().await.push(device);
                        Json(json!({"status": "ok"}))
                    },
                ),
            )
            .with_state(seen.clone());
        let base_url = format!("{}/", spawn_device(router).await);
        let client = RecorderClient::new(Client::new(), settings(base_url));

        let outcome = client.stop(7, 3, Some("cams/7?admin=1")).await;

        assert!(outcome.success);
        assert_eq!(*seen.lock().await, vec!["cams/7?admin=1".to_string()]);
    }

    #[tokio::test]
    async fn unparsable_base_url_is_not_configured() {
        let client = RecorderClient::new(Client::new(), settings("not a url".into()));

        let outcome = client.start(1, 1, Some("cam-1")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 0);
    }
}
