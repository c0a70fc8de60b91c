pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::dao::models::{
    CourtEntity, CourtId, MatchEntity, MatchId, MatchLogEntity, NewMatch, ScoreStateEntity,
};
use crate::dao::storage::StorageResult;

pub use memory::InMemoryScoreboardStore;

/// Abstraction over the durable state of courts, matches, live scores and match logs.
pub trait ScoreboardStore: Send + Sync {
    fn find_court(&self, id: CourtId) -> BoxFuture<'static, StorageResult<Option<CourtEntity>>>;
    /// Insert courts `1..=count` that do not exist yet, leaving existing rows untouched.
    fn ensure_courts(&self, count: CourtId) -> BoxFuture<'static, StorageResult<()>>;
    /// Point the court at a match. Returns `false` when the court does not exist.
    fn set_current_match(
        &self,
        court_id: CourtId,
        match_id: Option<MatchId>,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    fn find_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Insert a match, assigning the next id in insertion order.
    fn insert_match(&self, new_match: NewMatch) -> BoxFuture<'static, StorageResult<MatchEntity>>;
    fn save_match(&self, match_entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Not-completed matches of a court in insertion order, at most `limit`.
    fn upcoming_matches(
        &self,
        court_id: CourtId,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;

    fn find_score_state(
        &self,
        match_id: MatchId,
    ) -> BoxFuture<'static, StorageResult<Option<ScoreStateEntity>>>;
    /// Insert or overwrite the score state keyed by its match id.
    fn upsert_score_state(&self, score: ScoreStateEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Persist a match and its score state atomically: both land or neither does.
    fn save_match_state(
        &self,
        match_entity: MatchEntity,
        score: ScoreStateEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn open_match_log(&self, log: MatchLogEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Stamp the end time on logs of the match whose end time is still unset.
    /// Returns the number of rows closed.
    fn close_match_log(
        &self,
        match_id: MatchId,
        end_time: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    /// All match logs ordered by start time.
    fn list_match_logs(&self) -> BoxFuture<'static, StorageResult<Vec<MatchLogEntity>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// First not-completed match of a court in insertion order.
///
/// The displayed schedule time is editable and does not reflect play
/// eligibility, so it never takes part in the ordering.
pub async fn next_match(
    store: &dyn ScoreboardStore,
    court_id: CourtId,
) -> StorageResult<Option<MatchEntity>> {
    Ok(store.upcoming_matches(court_id, 1).await?.into_iter().next())
}
