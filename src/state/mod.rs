pub mod court_phase;
pub mod locks;
pub mod score_engine;
pub mod set_history;

use std::{future::Future, sync::Arc};

use reqwest::Client;
use tokio::sync::{RwLock, watch};
use tracing::warn;

use crate::{
    config::{AppConfig, TournamentLabel},
    dao::{models::CourtId, score_store::ScoreboardStore},
    error::ServiceError,
    services::{
        broadcast_hub::BroadcastHub,
        recorder_client::RecorderClient,
        relay::{DistributionChannel, LocalOnlyChannel, MemorySnapshotCache, SnapshotCache},
        webhook_client::WebhookNotifier,
    },
};

use self::{locks::CourtLocks, set_history::SetHistoryCache};

/// Handle passed to every route and service.
pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, viewer fan-out and the
/// collaborators driven by court transitions. Built once at startup.
pub struct AppState {
    store: RwLock<Option<Arc<dyn ScoreboardStore>>>,
    degraded: watch::Sender<bool>,
    hub: BroadcastHub,
    set_history: SetHistoryCache,
    court_locks: CourtLocks,
    recorder: RecorderClient,
    notifier: WebhookNotifier,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Single-instance state: process-local snapshot cache, no relay.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> Result<SharedState, reqwest::Error> {
        let cache = Arc::new(MemorySnapshotCache::new(config.snapshot_ttl));
        Self::with_relay(config, cache, Arc::new(LocalOnlyChannel))
    }

    /// State whose broadcasts go through the given cache and distribution channel.
    pub fn with_relay(
        config: AppConfig,
        cache: Arc<dyn SnapshotCache>,
        channel: Arc<dyn DistributionChannel>,
    ) -> Result<SharedState, reqwest::Error> {
        let http = Client::builder().build()?;
        let label = TournamentLabel::new(config.tournament_label.clone());
        let (degraded_tx, _rx) = watch::channel(true);

        Ok(Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            hub: BroadcastHub::new(config.channel_scope.clone(), cache, channel),
            set_history: SetHistoryCache::new(),
            court_locks: CourtLocks::default(),
            recorder: RecorderClient::new(http.clone(), config.recorder.clone()),
            notifier: WebhookNotifier::new(http, config.webhook.clone(), label),
            config: Arc::new(config),
        }))
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn ScoreboardStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn ScoreboardStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a store, create the configured courts and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn ScoreboardStore>) {
        if let Err(err) = store.ensure_courts(self.config.court_count).await {
            warn!(error = %err, "failed to ensure courts on store install");
        }
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Per-court update fan-out.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Closed sets of matches played on this instance.
    pub fn set_history(&self) -> &SetHistoryCache {
        &self.set_history
    }

    /// Device-control client.
    pub fn recorder(&self) -> &RecorderClient {
        &self.recorder
    }

    /// Tournament hub webhook.
    pub fn notifier(&self) -> &WebhookNotifier {
        &self.notifier
    }

    /// Handle to the tournament label sent with webhook notifications.
    pub fn tournament_label(&self) -> &TournamentLabel {
        self.notifier.tournament_label()
    }

    /// Current configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Run `work` while holding the court's lock.
    ///
    /// Every read-modify-write of a court's match and score goes through here,
    /// so concurrent requests for one court apply one after the other.
    pub async fn run_exclusive<F, Fut, T>(
        &self,
        court_id: CourtId,
        work: F,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let Some(guard) = self.court_locks.acquire(court_id).await else {
            warn!(court_id, "timed out waiting for court lock");
            return Err(ServiceError::Timeout);
        };
        let result = work().await;
        drop(guard);
        result
    }
}
