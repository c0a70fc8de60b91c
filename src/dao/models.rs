use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Stable court identifier.
pub type CourtId = u32;
/// Match identifier, assigned in insertion order.
pub type MatchId = u64;

/// Playing surface hosting at most one current match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourtEntity {
    /// Stable identifier for the court.
    pub id: CourtId,
    /// Display name (e.g. "Court 12").
    pub name: String,
    /// Match currently bound to the court.
    pub current_match_id: Option<MatchId>,
    /// Identifier of the recording device mounted on this court.
    pub recorder_device_id: Option<String>,
}

impl CourtEntity {
    /// Build an empty court with the default display name.
    pub fn numbered(id: CourtId) -> Self {
        Self {
            id,
            name: format!("Court {id}"),
            current_match_id: None,
            recorder_device_id: None,
        }
    }
}

/// One contest between two teams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Identifier assigned at insertion; ascending ids follow upload order.
    pub id: MatchId,
    /// Court the match is scheduled on.
    pub court_id: CourtId,
    /// Name of the team shown on the left.
    pub team_a: String,
    /// Name of the team shown on the right.
    pub team_b: String,
    /// Sets won by team A.
    pub sets_a: u8,
    /// Sets won by team B.
    pub sets_b: u8,
    /// Displayed start time. Editable, so never used to pick the next match.
    pub scheduled_start: Option<SystemTime>,
    /// Whether the match has been decided.
    pub is_completed: bool,
    /// Identifier assigned by the schedule provider.
    pub external_match_id: Option<String>,
    /// Crossover matches are decided by a single set.
    pub is_crossover: bool,
    /// Insertion timestamp.
    pub created_at: SystemTime,
}

/// Fields supplied when a new match is inserted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewMatch {
    /// Court the match is queued on.
    pub court_id: CourtId,
    /// First team.
    pub team_a: String,
    /// Second team.
    pub team_b: String,
    /// Planned start, if known.
    pub scheduled_start: Option<SystemTime>,
    /// Identifier in the tournament system.
    pub external_match_id: Option<String>,
    /// Single set to 15.
    pub is_crossover: bool,
}

/// Live point state of the current set of a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreStateEntity {
    /// Match the score belongs to (unique).
    pub match_id: MatchId,
    /// Set currently being played, starting at 1.
    pub set_number: u8,
    /// Points of team A in the current set.
    pub team_a_score: u16,
    /// Points of team B in the current set.
    pub team_b_score: u16,
    /// Last time the score was written.
    pub updated_at: SystemTime,
}

impl ScoreStateEntity {
    /// Fresh state: first set, nil-nil.
    pub fn fresh(match_id: MatchId) -> Self {
        Self {
            match_id,
            set_number: 1,
            team_a_score: 0,
            team_b_score: 0,
            updated_at: SystemTime::now(),
        }
    }
}

/// Durable record of when a match was played on a court.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchLogEntity {
    /// Identifier of the log row.
    pub id: Uuid,
    /// Court the match was played on.
    pub court_id: CourtId,
    /// Match being logged.
    pub match_id: MatchId,
    /// Team A name when the match started.
    pub team_a: String,
    /// Team B name when the match started.
    pub team_b: String,
    /// When scoring began.
    pub start_time: SystemTime,
    /// When the deciding set was confirmed.
    pub end_time: Option<SystemTime>,
}

impl MatchLogEntity {
    /// Open a log row for a match that starts now.
    pub fn open(court_id: CourtId, match_entity: &MatchEntity) -> Self {
        Self {
            id: Uuid::new_v4(),
            court_id,
            match_id: match_entity.id,
            team_a: match_entity.team_a.clone(),
            team_b: match_entity.team_b.clone(),
            start_time: SystemTime::now(),
            end_time: None,
        }
    }
}
