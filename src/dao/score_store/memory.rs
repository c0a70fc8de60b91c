//! Process-local scoreboard store.
//!
//! Used when no database is configured and as the backing store in tests. All
//! tables sit behind one lock, so a match and its score state are always
//! written together.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::SystemTime,
};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::RwLock;

use super::ScoreboardStore;
use crate::dao::{
    models::{
        CourtEntity, CourtId, MatchEntity, MatchId, MatchLogEntity, NewMatch, ScoreStateEntity,
    },
    storage::{StorageError, StorageResult},
};

/// Failures raised by the in-memory store.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// The store was switched offline.
    #[error("in-memory store is offline")]
    Offline,
    /// A match and score write was set up to fail.
    #[error("injected match state write failure")]
    InjectedWriteFailure,
}

#[derive(Default)]
struct Tables {
    courts: BTreeMap<CourtId, CourtEntity>,
    matches: BTreeMap<MatchId, MatchEntity>,
    scores: HashMap<MatchId, ScoreStateEntity>,
    logs: Vec<MatchLogEntity>,
    last_match_id: MatchId,
}

/// Scoreboard store keeping every table in memory.
#[derive(Clone, Default)]
pub struct InMemoryScoreboardStore {
    tables: Arc<RwLock<Tables>>,
    offline: Arc<AtomicBool>,
    failing_state_writes: Arc<AtomicU32>,
}

impl InMemoryScoreboardStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make the next `count` match and score writes fail without writing anything.
    pub fn fail_state_writes(&self, count: u32) {
        self.failing_state_writes.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_state_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable(
                "in-memory store".into(),
                MemoryStoreError::Offline,
            ))
        } else {
            Ok(())
        }
    }

    /// Run a read-only closure against the tables.
    fn read<T, F>(&self, f: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Tables) -> T + Send + 'static,
    {
        let store = self.clone();
        Box::pin(async move {
            store.check_online()?;
            let guard = store.tables.read().await;
            Ok(f(&*guard))
        })
    }

    /// Run a mutating closure against the tables.
    fn write<T, F>(&self, f: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut Tables) -> T + Send + 'static,
    {
        let store = self.clone();
        Box::pin(async move {
            store.check_online()?;
            let mut guard = store.tables.write().await;
            Ok(f(&mut *guard))
        })
    }
}

impl ScoreboardStore for InMemoryScoreboardStore {
    fn find_court(&self, id: CourtId) -> BoxFuture<'static, StorageResult<Option<CourtEntity>>> {
        self.read(move |tables| tables.courts.get(&id).cloned())
    }

    fn ensure_courts(&self, count: CourtId) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |tables| {
            for id in 1..=count {
                tables
                    .courts
                    .entry(id)
                    .or_insert_with(|| CourtEntity::numbered(id));
            }
        })
    }

    fn set_current_match(
        &self,
        court_id: CourtId,
        match_id: Option<MatchId>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.write(move |tables| match tables.courts.get_mut(&court_id) {
            Some(court) => {
                court.current_match_id = match_id;
                true
            }
            None => false,
        })
    }

    fn find_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        self.read(move |tables| tables.matches.get(&id).cloned())
    }

    fn insert_match(&self, new_match: NewMatch) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        self.write(move |tables| {
            tables.last_match_id += 1;
            let entity = MatchEntity {
                id: tables.last_match_id,
                court_id: new_match.court_id,
                team_a: new_match.team_a,
                team_b: new_match.team_b,
                sets_a: 0,
                sets_b: 0,
                scheduled_start: new_match.scheduled_start,
                is_completed: false,
                external_match_id: new_match.external_match_id,
                is_crossover: new_match.is_crossover,
                created_at: SystemTime::now(),
            };
            tables.matches.insert(entity.id, entity.clone());
            entity
        })
    }

    fn save_match(&self, match_entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |tables| {
            tables.last_match_id = tables.last_match_id.max(match_entity.id);
            tables.matches.insert(match_entity.id, match_entity);
        })
    }

    fn upcoming_matches(
        &self,
        court_id: CourtId,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        self.read(move |tables| {
            // BTreeMap iteration is ascending by id, i.e. insertion order.
            tables
                .matches
                .values()
                .filter(|m| m.court_id == court_id && !m.is_completed)
                .take(limit)
                .cloned()
                .collect()
        })
    }

    fn find_score_state(
        &self,
        match_id: MatchId,
    ) -> BoxFuture<'static, StorageResult<Option<ScoreStateEntity>>> {
        self.read(move |tables| tables.scores.get(&match_id).cloned())
    }

    fn upsert_score_state(
        &self,
        score: ScoreStateEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |tables| {
            tables.scores.insert(score.match_id, score);
        })
    }

    fn save_match_state(
        &self,
        match_entity: MatchEntity,
        score: ScoreStateEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        if self.take_injected_failure() {
            return Box::pin(async {
                Err(StorageError::unavailable(
                    "in-memory store".into(),
                    MemoryStoreError::InjectedWriteFailure,
                ))
            });
        }
        self.write(move |tables| {
            tables.matches.insert(match_entity.id, match_entity);
            tables.scores.insert(score.match_id, score);
        })
    }

    fn open_match_log(&self, log: MatchLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |tables| tables.logs.push(log))
    }

    fn close_match_log(
        &self,
        match_id: MatchId,
        end_time: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        self.write(move |tables| {
            let mut closed = 0;
            for log in tables
                .logs
                .iter_mut()
                .filter(|log| log.match_id == match_id && log.end_time.is_none())
            {
                log.end_time = Some(end_time);
                closed += 1;
            }
            closed
        })
    }

    fn list_match_logs(&self) -> BoxFuture<'static, StorageResult<Vec<MatchLogEntity>>> {
        self.read(|tables| {
            let mut logs = tables.logs.clone();
            logs.sort_by_key(|log| log.start_time);
            logs
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.read(|_| ())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.read(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::score_store::next_match;

    fn new_match(court_id: CourtId, team_a: &str) -> NewMatch {
        NewMatch {
            court_id,
            team_a: team_a.into(),
            team_b: "Opponents".into(),
            scheduled_start: None,
            external_match_id: None,
            is_crossover: false,
        }
    }

    #[tokio::test]
    async fn next_match_follows_insertion_order_not_schedule() {
        let store = InMemoryScoreboardStore::new();
        let mut first = store.insert_match(new_match(5, "First")).await.unwrap();
        let second = store.insert_match(new_match(5, "Second")).await.unwrap();
        store.insert_match(new_match(6, "Elsewhere")).await.unwrap();

        // Reschedule the first match far into the future; it still plays first.
        first.scheduled_start = Some(SystemTime::now() + std::time::Duration::from_secs(86_400));
        store.save_match(first.clone()).await.unwrap();

        let next = next_match(&store, 5).await.unwrap().unwrap();
        assert_eq!(next.id, first.id);

        first.is_completed = true;
        store.save_match(first).await.unwrap();
        let next = next_match(&store, 5).await.unwrap().unwrap();
        assert_eq!(next.id, second.id);
    }

    #[tokio::test]
    async fn ensure_courts_keeps_existing_pointer() {
        let store = InMemoryScoreboardStore::new();
        store.ensure_courts(3).await.unwrap();
        assert!(store.set_current_match(2, Some(11)).await.unwrap());
        store.ensure_courts(4).await.unwrap();

        assert!(store.find_court(4).await.unwrap().is_some());
        assert!(store.find_court(5).await.unwrap().is_none());
        let court = store.find_court(2).await.unwrap().unwrap();
        assert_eq!(court.current_match_id, Some(11));
        assert!(!store.set_current_match(99, None).await.unwrap());
    }

    #[tokio::test]
    async fn close_match_log_only_touches_open_rows() {
        let store = InMemoryScoreboardStore::new();
        let entity = store.insert_match(new_match(1, "Alpha")).await.unwrap();
        store
            .open_match_log(MatchLogEntity::open(1, &entity))
            .await
            .unwrap();

        let now = SystemTime::now();
        assert_eq!(store.close_match_log(entity.id, now).await.unwrap(), 1);
        assert_eq!(store.close_match_log(entity.id, SystemTime::now()).await.unwrap(), 0);
        assert_eq!(store.list_match_logs().await.unwrap()[0].end_time, Some(now));
    }

    #[tokio::test]
    async fn offline_store_rejects_operations() {
        let store = InMemoryScoreboardStore::new();
        store.set_offline(true);
        assert!(store.find_court(1).await.is_err());
        store.set_offline(false);
        assert!(store.find_court(1).await.unwrap().is_none());
    }
}
