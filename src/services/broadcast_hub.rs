//! Fan-out of court snapshots to local viewers, the snapshot cache and sibling instances.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{sync::broadcast, time::timeout};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::models::CourtId,
    dto::score::ScoreUpdatePayload,
    services::relay::{DistributionChannel, RelayEnvelope, SnapshotCache},
};

const COURT_CHANNEL_CAPACITY: usize = 32;
/// Upper bound on one cache or relay round trip. Broadcasts run under the
/// court lock, so a stalled backend must not hold it.
pub const RELAY_CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-court broadcast hub.
///
/// Each court gets its own Tokio broadcast channel, created on first use. The
/// three delivery paths are best-effort: a cache or relay failure is logged
/// and the remaining paths still run.
pub struct BroadcastHub {
    instance_id: Uuid,
    scope: String,
    courts: DashMap<CourtId, broadcast::Sender<Arc<ScoreUpdatePayload>>>,
    cache: Arc<dyn SnapshotCache>,
    channel: Arc<dyn DistributionChannel>,
}

impl BroadcastHub {
    /// Hub for `scope` backed by the given cache and channel, with a fresh instance id.
    pub fn new(
        scope: impl Into<String>,
        cache: Arc<dyn SnapshotCache>,
        channel: Arc<dyn DistributionChannel>,
    ) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            scope: scope.into(),
            courts: DashMap::new(),
            cache,
            channel,
        }
    }

    /// Scope this instance serves.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Identifier stamped on relayed envelopes.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    fn sender(&self, court_id: CourtId) -> broadcast::Sender<Arc<ScoreUpdatePayload>> {
        self.courts
            .entry(court_id)
            .or_insert_with(|| broadcast::channel(COURT_CHANNEL_CAPACITY).0)
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn has_channel(&self, court_id: CourtId) -> bool {
        self.courts.contains_key(&court_id)
    }

    /// Receive every snapshot of `court_id` published from now on.
    pub fn subscribe(&self, court_id: CourtId) -> broadcast::Receiver<Arc<ScoreUpdatePayload>> {
        self.sender(court_id).subscribe()
    }

    /// Cache, deliver locally, then relay to sibling instances.
    pub async fn broadcast(&self, payload: ScoreUpdatePayload) {
        let court_id = payload.court_id;

        match timeout(RELAY_CALL_TIMEOUT, self.cache.put(court_id, payload.clone())).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(court_id, error = %err, "failed to cache court snapshot"),
            Err(_) => warn!(court_id, "snapshot cache write timed out"),
        }

        self.deliver_local(Arc::new(payload.clone()));

        let envelope = RelayEnvelope {
            origin: self.instance_id,
            payload,
        };
        match timeout(RELAY_CALL_TIMEOUT, self.channel.publish(envelope)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(
                court_id,
                error = %err,
                "cross-instance relay failed; update delivered to local viewers only"
            ),
            Err(_) => warn!(
                court_id,
                "cross-instance relay timed out; update delivered to local viewers only"
            ),
        }
    }

    /// Push a snapshot to the viewers connected to this instance.
    pub fn deliver_local(&self, payload: Arc<ScoreUpdatePayload>) {
        let court_id = payload.court_id;
        // Only courts somebody subscribed to have a channel worth sending on.
        let Some(sender) = self.courts.get(&court_id).map(|entry| entry.clone()) else {
            return;
        };
        let receivers = sender.send(payload).unwrap_or(0);
        debug!(court_id, receivers, "score update delivered locally");
    }

    /// Handle an envelope received from the distribution channel.
    pub fn accept_remote(&self, envelope: RelayEnvelope) {
        if envelope.origin == self.instance_id {
            return;
        }
        self.deliver_local(Arc::new(envelope.payload));
    }

    /// Latest cached snapshot of a court. Cache failures read as a miss.
    pub async fn cached(&self, court_id: CourtId) -> Option<ScoreUpdatePayload> {
        match timeout(RELAY_CALL_TIMEOUT, self.cache.get(court_id)).await {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                warn!(court_id, error = %err, "snapshot cache read failed");
                None
            }
            Err(_) => {
                warn!(court_id, "snapshot cache read timed out");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::services::relay::{
        LocalOnlyChannel, MemorySnapshotCache, RelayError, RelayResult, tests::payload,
    };

    struct BrokenChannel;

    impl DistributionChannel for BrokenChannel {
        fn publish(&self, _envelope: RelayEnvelope) -> BoxFuture<'static, RelayResult<()>> {
            Box::pin(async {
                Err(RelayError::Codec(
                    serde_json::from_str::<u8>("not json").unwrap_err(),
                ))
            })
        }
    }

    /// Backend that accepts the call and never answers.
    pub(crate) struct StalledRelay;

    impl DistributionChannel for StalledRelay {
        fn publish(&self, _envelope: RelayEnvelope) -> BoxFuture<'static, RelayResult<()>> {
            Box::pin(futures::future::pending())
        }
    }

    impl SnapshotCache for StalledRelay {
        fn put(
            &self,
            _court_id: CourtId,
            _payload: ScoreUpdatePayload,
        ) -> BoxFuture<'static, RelayResult<()>> {
            Box::pin(futures::future::pending())
        }

        fn get(
            &self,
            _court_id: CourtId,
        ) -> BoxFuture<'static, RelayResult<Option<ScoreUpdatePayload>>> {
            Box::pin(futures::future::pending())
        }
    }

    fn hub(channel: Arc<dyn DistributionChannel>) -> BroadcastHub {
        BroadcastHub::new(
            "default",
            Arc::new(MemorySnapshotCache::new(Duration::from_secs(60))),
            channel,
        )
    }

    #[tokio::test]
    async fn relay_failure_still_caches_and_delivers_locally() {
        let hub = hub(Arc::new(BrokenChannel));
        let mut viewer = hub.subscribe(4);

        hub.broadcast(payload(4, 7)).await;

        assert_eq!(viewer.recv().await.unwrap().team_a_score, 7);
        assert_eq!(hub.cached(4).await.unwrap().team_a_score, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_backends_are_cut_off() {
        let hub = BroadcastHub::new("default", Arc::new(StalledRelay), Arc::new(StalledRelay));
        let mut viewer = hub.subscribe(2);
        let started = tokio::time::Instant::now();

        hub.broadcast(payload(2, 9)).await;
        assert!(hub.cached(2).await.is_none());

        assert_eq!(viewer.recv().await.unwrap().team_a_score, 9);
        assert!(started.elapsed() <= RELAY_CALL_TIMEOUT * 3);
    }

    #[tokio::test]
    async fn updates_reach_only_the_courts_subscribers_in_order() {
        let hub = hub(Arc::new(LocalOnlyChannel));
        let mut court_one = hub.subscribe(1);
        let mut court_two = hub.subscribe(2);

        hub.broadcast(payload(1, 1)).await;
        hub.broadcast(payload(1, 2)).await;

        assert_eq!(court_one.recv().await.unwrap().team_a_score, 1);
        assert_eq!(court_one.recv().await.unwrap().team_a_score, 2);
        assert!(court_two.try_recv().is_err());
    }

    #[tokio::test]
    async fn own_envelopes_are_not_delivered_twice() {
        let hub = hub(Arc::new(LocalOnlyChannel));
        let mut viewer = hub.subscribe(1);

        hub.accept_remote(RelayEnvelope {
            origin: hub.instance_id(),
            payload: payload(1, 3),
        });
        hub.accept_remote(RelayEnvelope {
            origin: Uuid::new_v4(),
            payload: payload(1, 5),
        });

        assert_eq!(viewer.recv().await.unwrap().team_a_score, 5);
        assert!(viewer.try_recv().is_err());
    }
}
