//! Snapshot cache and cross-process distribution used by the broadcast hub.
//!
//! Both seams have a process-local implementation for single-instance
//! deployments and tests, and a Redis implementation behind `redis-relay`.

#[cfg(feature = "redis-relay")]
pub mod redis;

use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{dao::models::CourtId, dto::score::ScoreUpdatePayload};

/// Failures of the cache or distribution backends.
#[derive(Debug, Error)]
pub enum RelayError {
    #[cfg(feature = "redis-relay")]
    #[error("redis command failed: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("failed to encode or decode relay message: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Result alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Message published to sibling instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEnvelope {
    /// Instance that produced the update; receivers skip their own messages.
    pub origin: Uuid,
    /// Snapshot being relayed.
    pub payload: ScoreUpdatePayload,
}

/// Short-lived, last-write-wins store of the latest snapshot per court.
pub trait SnapshotCache: Send + Sync {
    fn put(
        &self,
        court_id: CourtId,
        payload: ScoreUpdatePayload,
    ) -> BoxFuture<'static, RelayResult<()>>;
    fn get(&self, court_id: CourtId) -> BoxFuture<'static, RelayResult<Option<ScoreUpdatePayload>>>;
}

/// Fan-out channel reaching the viewers connected to other instances.
pub trait DistributionChannel: Send + Sync {
    fn publish(&self, envelope: RelayEnvelope) -> BoxFuture<'static, RelayResult<()>>;
}

/// Cache key of a court snapshot.
pub fn snapshot_key(scope: &str, court_id: CourtId) -> String {
    format!("{scope}:court:{court_id}:score")
}

/// Distribution channel of a court.
pub fn court_channel(scope: &str, court_id: CourtId) -> String {
    format!("{scope}:court:{court_id}")
}

/// Process-local snapshot cache with a per-entry time-to-live.
pub struct MemorySnapshotCache {
    entries: DashMap<CourtId, (Instant, ScoreUpdatePayload)>,
    ttl: Duration,
}

impl MemorySnapshotCache {
    /// Cache whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

impl SnapshotCache for MemorySnapshotCache {
    fn put(
        &self,
        court_id: CourtId,
        payload: ScoreUpdatePayload,
    ) -> BoxFuture<'static, RelayResult<()>> {
        self.entries
            .insert(court_id, (Instant::now() + self.ttl, payload));
        Box::pin(async { Ok(()) })
    }

    fn get(&self, court_id: CourtId) -> BoxFuture<'static, RelayResult<Option<ScoreUpdatePayload>>> {
        let now = Instant::now();
        let found = match self.entries.get(&court_id) {
            Some(entry) if entry.0 > now => Some(entry.1.clone()),
            Some(entry) => {
                drop(entry);
                self.entries.remove_if(&court_id, |_, (expires, _)| *expires <= now);
                None
            }
            None => None,
        };
        Box::pin(async move { Ok(found) })
    }
}

/// Distribution channel for single-instance deployments: publishing is a no-op.
#[derive(Debug, Default)]
pub struct LocalOnlyChannel;

impl DistributionChannel for LocalOnlyChannel {
    fn publish(&self, _envelope: RelayEnvelope) -> BoxFuture<'static, RelayResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn payload(court_id: CourtId, team_a_score: u16) -> ScoreUpdatePayload {
        ScoreUpdatePayload {
            court_id,
            match_id: 1,
            team_a: "Sand Storm".into(),
            team_b: "Net Results".into(),
            team_a_score,
            team_b_score: 0,
            sets_a: 0,
            sets_b: 0,
            set_number: 1,
            set_history: Vec::new(),
            pending_set_win: None,
            is_crossover: false,
            is_completed: false,
            updated_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn memory_cache_is_last_write_wins_and_expires() {
        let cache = MemorySnapshotCache::new(Duration::from_millis(40));
        cache.put(3, payload(3, 1)).await.unwrap();
        cache.put(3, payload(3, 2)).await.unwrap();
        assert_eq!(cache.get(3).await.unwrap().unwrap().team_a_score, 2);
        assert!(cache.get(4).await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get(3).await.unwrap().is_none());
    }

    #[test]
    fn keys_are_scoped() {
        assert_eq!(snapshot_key("finals", 12), "finals:court:12:score");
        assert_eq!(court_channel("finals", 12), "finals:court:12");
    }
}
