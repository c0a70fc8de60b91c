use std::sync::{Arc, Mutex};

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::{
    config::AppConfig,
    dao::{
        models::{CourtId, MatchEntity, NewMatch},
        score_store::{InMemoryScoreboardStore, ScoreboardStore},
    },
    state::{AppState, SharedState},
};

/// State backed by a fresh in-memory store with eight courts.
pub(crate) async fn memory_state() -> (SharedState, InMemoryScoreboardStore) {
    memory_state_with(AppConfig::default()).await
}

pub(crate) async fn memory_state_with(
    config: AppConfig,
) -> (SharedState, InMemoryScoreboardStore) {
    let state = AppState::new(AppConfig {
        court_count: 8,
        ..config
    })
    .unwrap();
    let store = InMemoryScoreboardStore::new();
    state
        .install_store(Arc::new(store.clone()) as Arc<dyn ScoreboardStore>)
        .await;
    (state, store)
}

pub(crate) async fn seed_match(
    store: &InMemoryScoreboardStore,
    court_id: CourtId,
    team_a: &str,
    team_b: &str,
    is_crossover: bool,
) -> MatchEntity {
    store
        .insert_match(NewMatch {
            court_id,
            team_a: team_a.into(),
            team_b: team_b.into(),
            scheduled_start: None,
            external_match_id: None,
            is_crossover,
        })
        .await
        .unwrap()
}

/// Bodies received by a local webhook endpoint.
pub(crate) type Received = Arc<Mutex<Vec<Value>>>;

/// Local endpoint answering every POST with `status`.
pub(crate) async fn spawn_webhook(status: StatusCode) -> (String, Received) {
    let received: Received = Arc::default();
    let router = Router::new()
        .route(
            "/hook",
            post(
                move |State(received): State<Received>, Json(body): Json<Value>| async move {
                    received.lock().unwrap().push(body);
                    status
                },
            ),
        )
        .with_state(received.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}/hook"), received)
}

/// Local endpoint that accepts connections but never answers a request.
pub(crate) async fn spawn_silent_endpoint() -> String {
    let router = Router::new().fallback(|| std::future::pending::<StatusCode>());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
