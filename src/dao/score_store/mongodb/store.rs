use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::{DateTime, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;

use super::{
    connection::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{
        COUNTER_COLLECTION, COURT_COLLECTION, LOG_COLLECTION, MATCH_COLLECTION, MATCH_SEQUENCE,
        MongoCounterDocument, MongoCourtDocument, MongoLiveScore, MongoMatchDocument,
        MongoMatchLogDocument, court_key, match_key, match_with_score,
    },
};
use crate::dao::{
    models::{
        CourtEntity, CourtId, MatchEntity, MatchId, MatchLogEntity, NewMatch, ScoreStateEntity,
    },
    score_store::ScoreboardStore,
    storage::StorageResult,
};

/// MongoDB-backed scoreboard store.
#[derive(Clone)]
pub struct MongoScoreboardStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database = self.config.open().await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

fn read_err(collection: &'static str) -> impl FnOnce(mongodb::error::Error) -> MongoDaoError {
    move |source| MongoDaoError::Read { collection, source }
}

fn write_err(collection: &'static str) -> impl FnOnce(mongodb::error::Error) -> MongoDaoError {
    move |source| MongoDaoError::Write { collection, source }
}

impl MongoScoreboardStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = config.open().await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let matches = self.collection::<MongoMatchDocument>(MATCH_COLLECTION).await;
        let court_queue = mongodb::IndexModel::builder()
            .keys(doc! {"court_id": 1, "is_completed": 1, "_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("match_court_queue_idx".to_owned()))
                    .build(),
            )
            .build();
        matches
            .create_index(court_queue)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION,
                index: "court_id,is_completed,_id",
                source,
            })?;

        let logs = self.collection::<MongoMatchLogDocument>(LOG_COLLECTION).await;
        let open_logs = mongodb::IndexModel::builder()
            .keys(doc! {"match_id": 1, "end_time": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("log_match_idx".to_owned()))
                    .build(),
            )
            .build();
        logs.create_index(open_logs)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: LOG_COLLECTION,
                index: "match_id,end_time",
                source,
            })?;

        Ok(())
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn find_court(&self, id: CourtId) -> MongoResult<Option<CourtEntity>> {
        let courts = self.collection::<MongoCourtDocument>(COURT_COLLECTION).await;
        courts
            .find_one(doc! {"_id": court_key(id)})
            .await
            .map_err(read_err(COURT_COLLECTION))?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn ensure_courts(&self, count: CourtId) -> MongoResult<()> {
        let courts = self.collection::<MongoCourtDocument>(COURT_COLLECTION).await;
        for id in 1..=count {
            courts
                .update_one(
                    doc! {"_id": court_key(id)},
                    doc! {"$setOnInsert": {
                        "name": format!("Court {id}"),
                        "current_match_id": mongodb::bson::Bson::Null,
                        "recorder_device_id": mongodb::bson::Bson::Null,
                    }},
                )
                .upsert(true)
                .await
                .map_err(write_err(COURT_COLLECTION))?;
        }
        Ok(())
    }

    async fn set_current_match(
        &self,
        court_id: CourtId,
        match_id: Option<MatchId>,
    ) -> MongoResult<bool> {
        let key = match_id.map(match_key).transpose()?;
        let courts = self.collection::<MongoCourtDocument>(COURT_COLLECTION).await;
        let result = courts
            .update_one(
                doc! {"_id": court_key(court_id)},
                doc! {"$set": {"current_match_id": key}},
            )
            .await
            .map_err(write_err(COURT_COLLECTION))?;
        Ok(result.matched_count > 0)
    }

    async fn find_match(&self, id: MatchId) -> MongoResult<Option<MatchEntity>> {
        let matches = self.collection::<MongoMatchDocument>(MATCH_COLLECTION).await;
        matches
            .find_one(doc! {"_id": match_key(id)?})
            .await
            .map_err(read_err(MATCH_COLLECTION))?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn next_match_id(&self) -> MongoResult<MatchId> {
        let counters = self.collection::<MongoCounterDocument>(COUNTER_COLLECTION).await;
        let counter = counters
            .find_one_and_update(
                doc! {"_id": MATCH_SEQUENCE},
                doc! {"$inc": {"value": 1_i64}},
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(write_err(COUNTER_COLLECTION))?
            .ok_or(MongoDaoError::SequenceExhausted)?;

        MatchId::try_from(counter.value).map_err(|_| MongoDaoError::Corrupt {
            collection: COUNTER_COLLECTION,
            message: format!("negative match sequence value {}", counter.value),
        })
    }

    async fn insert_match(&self, new_match: NewMatch) -> MongoResult<MatchEntity> {
        let entity = MatchEntity {
            id: self.next_match_id().await?,
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
        let document: MongoMatchDocument = entity.clone().try_into()?;
        let matches = self.collection::<MongoMatchDocument>(MATCH_COLLECTION).await;
        matches
            .insert_one(&document)
            .await
            .map_err(write_err(MATCH_COLLECTION))?;
        Ok(entity)
    }

    /// Write the match fields, keeping whatever live score the document holds.
    async fn save_match(&self, match_entity: MatchEntity) -> MongoResult<()> {
        let document: MongoMatchDocument = match_entity.try_into()?;
        let matches = self.collection::<MongoMatchDocument>(MATCH_COLLECTION).await;
        matches
            .update_one(
                doc! {"_id": document.id},
                doc! {"$set": {
                    "court_id": document.court_id,
                    "team_a": document.team_a,
                    "team_b": document.team_b,
                    "sets_a": document.sets_a,
                    "sets_b": document.sets_b,
                    "scheduled_start": document.scheduled_start,
                    "is_completed": document.is_completed,
                    "external_match_id": document.external_match_id,
                    "is_crossover": document.is_crossover,
                    "created_at": document.created_at,
                }},
            )
            .upsert(true)
            .await
            .map_err(write_err(MATCH_COLLECTION))?;
        Ok(())
    }

    async fn upcoming_matches(&self, court_id: CourtId, limit: usize) -> MongoResult<Vec<MatchEntity>> {
        let matches = self.collection::<MongoMatchDocument>(MATCH_COLLECTION).await;
        let documents: Vec<MongoMatchDocument> = matches
            .find(doc! {"court_id": court_key(court_id), "is_completed": false})
            .sort(doc! {"_id": 1})
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(read_err(MATCH_COLLECTION))?
            .try_collect()
            .await
            .map_err(read_err(MATCH_COLLECTION))?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_score_state(&self, match_id: MatchId) -> MongoResult<Option<ScoreStateEntity>> {
        let matches = self.collection::<MongoMatchDocument>(MATCH_COLLECTION).await;
        let document = matches
            .find_one(doc! {"_id": match_key(match_id)?})
            .await
            .map_err(read_err(MATCH_COLLECTION))?;

        document
            .and_then(|document| document.live_score)
            .map(|live| live.into_entity(match_id))
            .transpose()
    }

    async fn upsert_score_state(&self, score: ScoreStateEntity) -> MongoResult<()> {
        let live = MongoLiveScore::from(&score);
        let matches = self.collection::<MongoMatchDocument>(MATCH_COLLECTION).await;
        let result = matches
            .update_one(
                doc! {"_id": match_key(score.match_id)?},
                doc! {"$set": {"live_score": {
                    "set_number": live.set_number,
                    "team_a_score": live.team_a_score,
                    "team_b_score": live.team_b_score,
                    "updated_at": live.updated_at,
                }}},
            )
            .await
            .map_err(write_err(MATCH_COLLECTION))?;
        if result.matched_count == 0 {
            return Err(MongoDaoError::Corrupt {
                collection: MATCH_COLLECTION,
                message: format!("score state for unknown match {}", score.match_id),
            });
        }
        Ok(())
    }

    /// Match and live score in a single document replacement.
    async fn save_match_state(
        &self,
        match_entity: MatchEntity,
        score: ScoreStateEntity,
    ) -> MongoResult<()> {
        let document = match_with_score(match_entity, &score)?;
        let matches = self.collection::<MongoMatchDocument>(MATCH_COLLECTION).await;
        matches
            .replace_one(doc! {"_id": document.id}, &document)
            .upsert(true)
            .await
            .map_err(write_err(MATCH_COLLECTION))?;
        Ok(())
    }

    async fn open_match_log(&self, log: MatchLogEntity) -> MongoResult<()> {
        let document: MongoMatchLogDocument = log.try_into()?;
        let logs = self.collection::<MongoMatchLogDocument>(LOG_COLLECTION).await;
        logs.insert_one(&document)
            .await
            .map_err(write_err(LOG_COLLECTION))?;
        Ok(())
    }

    async fn close_match_log(&self, match_id: MatchId, end_time: SystemTime) -> MongoResult<u64> {
        let logs = self.collection::<MongoMatchLogDocument>(LOG_COLLECTION).await;
        let result = logs
            .update_many(
                doc! {"match_id": match_key(match_id)?, "end_time": mongodb::bson::Bson::Null},
                doc! {"$set": {"end_time": DateTime::from_system_time(end_time)}},
            )
            .await
            .map_err(write_err(LOG_COLLECTION))?;
        Ok(result.modified_count)
    }

    async fn list_match_logs(&self) -> MongoResult<Vec<MatchLogEntity>> {
        let logs = self.collection::<MongoMatchLogDocument>(LOG_COLLECTION).await;
        let documents: Vec<MongoMatchLogDocument> = logs
            .find(doc! {})
            .sort(doc! {"start_time": 1})
            .await
            .map_err(read_err(LOG_COLLECTION))?
            .try_collect()
            .await
            .map_err(read_err(LOG_COLLECTION))?;

        documents.into_iter().map(TryInto::try_into).collect()
    }
}

impl ScoreboardStore for MongoScoreboardStore {
    fn find_court(&self, id: CourtId) -> BoxFuture<'static, StorageResult<Option<CourtEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_court(id).await.map_err(Into::into) })
    }

    fn ensure_courts(&self, count: CourtId) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_courts(count).await.map_err(Into::into) })
    }

    fn set_current_match(
        &self,
        court_id: CourtId,
        match_id: Option<MatchId>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_current_match(court_id, match_id)
                .await
                .map_err(Into::into)
        })
    }

    fn find_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(id).await.map_err(Into::into) })
    }

    fn insert_match(&self, new_match: NewMatch) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        Box::pin(async move { store.insert_match(new_match).await.map_err(Into::into) })
    }

    fn save_match(&self, match_entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_match(match_entity).await.map_err(Into::into) })
    }

    fn upcoming_matches(
        &self,
        court_id: CourtId,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upcoming_matches(court_id, limit)
                .await
                .map_err(Into::into)
        })
    }

    fn find_score_state(
        &self,
        match_id: MatchId,
    ) -> BoxFuture<'static, StorageResult<Option<ScoreStateEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_score_state(match_id).await.map_err(Into::into) })
    }

    fn upsert_score_state(
        &self,
        score: ScoreStateEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_score_state(score).await.map_err(Into::into) })
    }

    fn save_match_state(
        &self,
        match_entity: MatchEntity,
        score: ScoreStateEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_match_state(match_entity, score)
                .await
                .map_err(Into::into)
        })
    }

    fn open_match_log(&self, log: MatchLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.open_match_log(log).await.map_err(Into::into) })
    }

    fn close_match_log(
        &self,
        match_id: MatchId,
        end_time: SystemTime,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .close_match_log(match_id, end_time)
                .await
                .map_err(Into::into)
        })
    }

    fn list_match_logs(&self) -> BoxFuture<'static, StorageResult<Vec<MatchLogEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_match_logs().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
