use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    CourtEntity, CourtId, MatchEntity, MatchId, MatchLogEntity, ScoreStateEntity,
};

pub const COURT_COLLECTION: &str = "courts";
pub const MATCH_COLLECTION: &str = "matches";
pub const LOG_COLLECTION: &str = "match_logs";
pub const COUNTER_COLLECTION: &str = "counters";
pub const MATCH_SEQUENCE: &str = "match_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCourtDocument {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub current_match_id: Option<i64>,
    #[serde(default)]
    pub recorder_device_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    pub id: i64,
    pub court_id: i64,
    pub team_a: String,
    pub team_b: String,
    pub sets_a: i32,
    pub sets_b: i32,
    pub scheduled_start: Option<DateTime>,
    pub is_completed: bool,
    pub external_match_id: Option<String>,
    #[serde(default)]
    pub is_crossover: bool,
    pub created_at: DateTime,
    /// Live score of the match, stored in the same document so a confirmed
    /// set and the score reset it causes land in one write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_score: Option<MongoLiveScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoLiveScore {
    pub set_number: i32,
    pub team_a_score: i32,
    pub team_b_score: i32,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchLogDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub court_id: i64,
    pub match_id: i64,
    pub team_a: String,
    pub team_b: String,
    pub start_time: DateTime,
    pub end_time: Option<DateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCounterDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub value: i64,
}

fn corrupt(collection: &'static str, message: String) -> MongoDaoError {
    MongoDaoError::Corrupt {
        collection,
        message,
    }
}

fn narrow<T, S>(collection: &'static str, field: &str, value: S) -> Result<T, MongoDaoError>
where
    S: Copy + std::fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| corrupt(collection, format!("`{field}` out of range: {value}")))
}

pub fn court_key(id: CourtId) -> i64 {
    i64::from(id)
}

pub fn match_key(id: MatchId) -> Result<i64, MongoDaoError> {
    narrow(MATCH_COLLECTION, "_id", id)
}

impl TryFrom<MongoCourtDocument> for CourtEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoCourtDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: narrow(COURT_COLLECTION, "_id", value.id)?,
            name: value.name,
            current_match_id: value
                .current_match_id
                .map(|id| narrow(COURT_COLLECTION, "current_match_id", id))
                .transpose()?,
            recorder_device_id: value.recorder_device_id,
        })
    }
}

impl TryFrom<MatchEntity> for MongoMatchDocument {
    type Error = MongoDaoError;

    fn try_from(value: MatchEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: match_key(value.id)?,
            court_id: court_key(value.court_id),
            team_a: value.team_a,
            team_b: value.team_b,
            sets_a: i32::from(value.sets_a),
            sets_b: i32::from(value.sets_b),
            scheduled_start: value.scheduled_start.map(DateTime::from_system_time),
            is_completed: value.is_completed,
            external_match_id: value.external_match_id,
            is_crossover: value.is_crossover,
            created_at: DateTime::from_system_time(value.created_at),
            live_score: None,
        })
    }
}

impl TryFrom<MongoMatchDocument> for MatchEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoMatchDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: narrow(MATCH_COLLECTION, "_id", value.id)?,
            court_id: narrow(MATCH_COLLECTION, "court_id", value.court_id)?,
            team_a: value.team_a,
            team_b: value.team_b,
            sets_a: narrow(MATCH_COLLECTION, "sets_a", value.sets_a)?,
            sets_b: narrow(MATCH_COLLECTION, "sets_b", value.sets_b)?,
            scheduled_start: value.scheduled_start.map(DateTime::to_system_time),
            is_completed: value.is_completed,
            external_match_id: value.external_match_id,
            is_crossover: value.is_crossover,
            created_at: value.created_at.to_system_time(),
        })
    }
}

impl From<&ScoreStateEntity> for MongoLiveScore {
    fn from(value: &ScoreStateEntity) -> Self {
        Self {
            set_number: i32::from(value.set_number),
            team_a_score: i32::from(value.team_a_score),
            team_b_score: i32::from(value.team_b_score),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl MongoLiveScore {
    pub fn into_entity(self, match_id: MatchId) -> Result<ScoreStateEntity, MongoDaoError> {
        Ok(ScoreStateEntity {
            match_id,
            set_number: narrow(MATCH_COLLECTION, "live_score.set_number", self.set_number)?,
            team_a_score: narrow(MATCH_COLLECTION, "live_score.team_a_score", self.team_a_score)?,
            team_b_score: narrow(MATCH_COLLECTION, "live_score.team_b_score", self.team_b_score)?,
            updated_at: self.updated_at.to_system_time(),
        })
    }
}

/// Match document carrying its live score, written as a single document.
pub fn match_with_score(
    match_entity: MatchEntity,
    score: &ScoreStateEntity,
) -> Result<MongoMatchDocument, MongoDaoError> {
    if score.match_id != match_entity.id {
        return Err(corrupt(
            MATCH_COLLECTION,
            format!(
                "score state of match {} saved with match {}",
                score.match_id, match_entity.id
            ),
        ));
    }
    let mut document = MongoMatchDocument::try_from(match_entity)?;
    document.live_score = Some(score.into());
    Ok(document)
}

impl TryFrom<MatchLogEntity> for MongoMatchLogDocument {
    type Error = MongoDaoError;

    fn try_from(value: MatchLogEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.to_string(),
            court_id: court_key(value.court_id),
            match_id: match_key(value.match_id)?,
            team_a: value.team_a,
            team_b: value.team_b,
            start_time: DateTime::from_system_time(value.start_time),
            end_time: value.end_time.map(DateTime::from_system_time),
        })
    }
}

impl TryFrom<MongoMatchLogDocument> for MatchLogEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoMatchLogDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&value.id)
                .map_err(|err| corrupt(LOG_COLLECTION, format!("invalid `_id`: {err}")))?,
            court_id: narrow(LOG_COLLECTION, "court_id", value.court_id)?,
            match_id: narrow(LOG_COLLECTION, "match_id", value.match_id)?,
            team_a: value.team_a,
            team_b: value.team_b,
            start_time: value.start_time.to_system_time(),
            end_time: value.end_time.map(DateTime::to_system_time),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use mongodb::bson::{Bson, serialize_to_document};

    use super::*;

    fn entity(id: MatchId) -> MatchEntity {
        MatchEntity {
            id,
            court_id: 5,
            team_a: "Alpha".into(),
            team_b: "Bravo".into(),
            sets_a: 1,
            sets_b: 0,
            scheduled_start: None,
            is_completed: false,
            external_match_id: None,
            is_crossover: false,
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn confirmed_set_and_score_reset_share_one_document() {
        let mut score = ScoreStateEntity::fresh(7);
        score.set_number = 2;

        let document = match_with_score(entity(7), &score).unwrap();
        let stored = serialize_to_document(&document).unwrap();
        assert_eq!(stored.get_i32("sets_a").unwrap(), 1);
        let live = stored.get_document("live_score").unwrap();
        assert_eq!(live.get_i32("set_number").unwrap(), 2);
        assert_eq!(live.get_i32("team_a_score").unwrap(), 0);

        let read = document.live_score.unwrap().into_entity(7).unwrap();
        assert_eq!(read.set_number, 2);
    }

    #[test]
    fn plain_match_document_leaves_live_score_untouched() {
        let document = MongoMatchDocument::try_from(entity(3)).unwrap();
        let stored = serialize_to_document(&document).unwrap();
        assert_eq!(stored.get("live_score"), None::<&Bson>);
    }

    #[test]
    fn mismatched_score_state_is_rejected() {
        let score = ScoreStateEntity::fresh(8);
        assert!(matches!(
            match_with_score(entity(7), &score),
            Err(MongoDaoError::Corrupt { .. })
        ));
    }
}
