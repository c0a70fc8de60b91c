//! Wire types of the court lifecycle API.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    dao::models::{CourtId, MatchEntity, MatchId, MatchLogEntity},
    dto::{format_system_time, score::ScoreUpdatePayload},
};

/// Result of a recorder start/stop command. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActuatorOutcome {
    /// Device accepted the command.
    pub success: bool,
    /// Device reply or the last failure.
    pub message: String,
    /// Remote calls made; zero when the recorder is not configured.
    pub attempts: u32,
}

impl ActuatorOutcome {
    /// Outcome for a court without a usable recorder configuration.
    pub fn not_configured(reason: &str) -> Self {
        Self {
            success: false,
            message: format!("recorder not configured: {reason}"),
            attempts: 0,
        }
    }
}

/// Result of a webhook notification. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationOutcome {
    /// Hub answered with a success status.
    pub delivered: bool,
    /// Status line or transport error.
    pub message: String,
}

/// Report of a successful advance.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceReport {
    /// Court that advanced.
    pub court_id: CourtId,
    /// Match that was completed before the advance, if any.
    pub previous_match_id: Option<MatchId>,
    /// Snapshot of the newly bound match.
    pub snapshot: ScoreUpdatePayload,
    /// Recorder start result.
    pub recorder: ActuatorOutcome,
    /// Start notification result.
    pub notification: NotificationOutcome,
}

/// Response of `advanceToNextMatch`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdvanceResponse {
    /// A new match is bound to the court.
    Advanced(AdvanceReport),
    /// The court still plays an uncompleted match; nothing changed.
    AlreadyInProgress {
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
}

/// Query string of the upcoming matches listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct UpcomingQuery {
    /// Maximum number of matches returned (default 5).
    pub limit: Option<usize>,
}

/// Match listed in a court queue.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    /// Match identifier.
    pub id: MatchId,
    /// Court the match is queued on.
    pub court_id: CourtId,
    /// First team.
    pub team_a: String,
    /// Second team.
    pub team_b: String,
    /// RFC 3339 start time, when scheduled.
    pub scheduled_start: Option<String>,
    /// Identifier in the tournament system.
    pub external_match_id: Option<String>,
    /// Single set to 15.
    pub is_crossover: bool,
}

impl From<MatchEntity> for MatchSummary {
    fn from(entity: MatchEntity) -> Self {
        Self {
            id: entity.id,
            court_id: entity.court_id,
            team_a: entity.team_a,
            team_b: entity.team_b,
            scheduled_start: entity.scheduled_start.map(format_system_time),
            external_match_id: entity.external_match_id,
            is_crossover: entity.is_crossover,
        }
    }
}

/// Durable record of when a match was played.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchLogSummary {
    /// Log row identifier.
    pub id: Uuid,
    /// Court the match was played on.
    pub court_id: CourtId,
    /// Match played.
    pub match_id: MatchId,
    /// First team.
    pub team_a: String,
    /// Second team.
    pub team_b: String,
    /// RFC 3339 time the match was bound.
    pub start_time: String,
    /// RFC 3339 time the match ended; absent while in play.
    pub end_time: Option<String>,
}

impl From<MatchLogEntity> for MatchLogSummary {
    fn from(entity: MatchLogEntity) -> Self {
        Self {
            id: entity.id,
            court_id: entity.court_id,
            match_id: entity.match_id,
            team_a: entity.team_a,
            team_b: entity.team_b,
            start_time: format_system_time(entity.start_time),
            end_time: entity.end_time.map(format_system_time),
        }
    }
}
