//! Courtside Live binary entrypoint wiring REST, WebSocket, SSE, storage and relay layers.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtside_live::{
    config::AppConfig,
    dao::score_store::{InMemoryScoreboardStore, ScoreboardStore},
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.port;
    let app_state = build_state(config.clone()).await?;

    spawn_storage(app_state.clone(), &config);

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the shared state, going through Redis when a relay URL is configured.
#[cfg(feature = "redis-relay")]
async fn build_state(config: AppConfig) -> anyhow::Result<SharedState> {
    use courtside_live::services::relay::redis::{
        RedisChannel, RedisSnapshotCache, connect, run_listener,
    };

    let Some(url) = config.redis_url.clone() else {
        return AppState::new(config).context("building HTTP client");
    };

    match connect(&url).await {
        Ok((client, connection)) => {
            let cache = Arc::new(RedisSnapshotCache::new(
                connection.clone(),
                config.channel_scope.clone(),
                config.snapshot_ttl,
            ));
            let channel = Arc::new(RedisChannel::new(connection, config.channel_scope.clone()));
            let state = AppState::with_relay(config, cache, channel).context("building HTTP client")?;
            tokio::spawn(run_listener(state.clone(), client));
            info!("cross-instance relay enabled");
            Ok(state)
        }
        Err(err) => {
            warn!(error = %err, "redis unavailable; serving local viewers only");
            AppState::new(config).context("building HTTP client")
        }
    }
}

#[cfg(not(feature = "redis-relay"))]
async fn build_state(config: AppConfig) -> anyhow::Result<SharedState> {
    if config.redis_url.is_some() {
        warn!("REDIS_URL set but built without `redis-relay`; serving local viewers only");
    }
    AppState::new(config).context("building HTTP client")
}

/// Install the storage backend: MongoDB under supervision when configured,
/// otherwise the in-memory store.
#[cfg(feature = "mongo-store")]
fn spawn_storage(state: SharedState, config: &AppConfig) {
    use courtside_live::dao::{
        score_store::mongodb::{MongoConfig, MongoScoreboardStore},
        storage::StorageError,
    };

    let Some(uri) = config.mongo_uri.clone() else {
        info!("no MONGO_URI configured; using the in-memory store");
        return spawn_memory_store(state);
    };

    let db_name = config.mongo_db.clone();
    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let mongo_config = MongoConfig::from_uri(&uri, db_name.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoScoreboardStore::connect(mongo_config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn ScoreboardStore>)
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_storage(state: SharedState, config: &AppConfig) {
    if config.mongo_uri.is_some() {
        warn!("MONGO_URI set but built without `mongo-store`; using the in-memory store");
    }
    spawn_memory_store(state);
}

fn spawn_memory_store(state: SharedState) {
    tokio::spawn(storage_supervisor::run(state, || async {
        Ok(Arc::new(InMemoryScoreboardStore::new()) as Arc<dyn ScoreboardStore>)
    }));
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
