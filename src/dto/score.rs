//! Wire types of the scoring API and the broadcast snapshot.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{CourtId, MatchEntity, MatchId, ScoreStateEntity},
    dto::{court::NotificationOutcome, format_system_time},
    state::{
        score_engine::{Scoreboard, Team},
        set_history::SetScore,
    },
};

/// Complete broadcastable state of a court. Viewers only ever see this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdatePayload {
    /// Court the snapshot belongs to.
    pub court_id: CourtId,
    /// Match bound to the court.
    pub match_id: MatchId,
    /// Team shown on the left.
    pub team_a: String,
    /// Team shown on the right.
    pub team_b: String,
    /// Current set points of team A.
    pub team_a_score: u16,
    /// Current set points of team B.
    pub team_b_score: u16,
    /// Sets won by team A.
    pub sets_a: u8,
    /// Sets won by team B.
    pub sets_b: u8,
    /// Set in play, starting at 1.
    pub set_number: u8,
    /// Final scores of the closed sets, oldest first.
    pub set_history: Vec<SetScore>,
    /// Team that reached a set-deciding score not yet confirmed by the operator.
    pub pending_set_win: Option<Team>,
    /// Single set to 15 instead of best of three.
    pub is_crossover: bool,
    /// Match decided; no further points are accepted.
    pub is_completed: bool,
    /// RFC 3339 timestamp of the last score write.
    pub updated_at: String,
}

impl ScoreUpdatePayload {
    /// Assemble the snapshot of a court from its durable rows and the set history.
    pub fn build(
        court_id: CourtId,
        match_entity: &MatchEntity,
        score: &ScoreStateEntity,
        set_history: Vec<SetScore>,
    ) -> Self {
        let board = Scoreboard::from_entities(match_entity, score);
        Self {
            court_id,
            match_id: match_entity.id,
            pending_set_win: board.pending_set_win(),
            team_a: board.team_a,
            team_b: board.team_b,
            team_a_score: board.score_a,
            team_b_score: board.score_b,
            sets_a: board.sets_a,
            sets_b: board.sets_b,
            set_number: board.set_number,
            set_history,
            is_crossover: board.is_crossover,
            is_completed: board.completed,
            updated_at: format_system_time(score.updated_at),
        }
    }
}

/// Point adjustment for one team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PointRequest {
    /// Court to score on.
    #[validate(range(min = 1))]
    pub court_id: CourtId,
    /// Team the point is credited to or taken from.
    pub team: Team,
    /// Match the operator screen believes is current; rejected when stale.
    pub match_id: Option<MatchId>,
}

/// Request addressing the current match of a court.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CourtRequest {
    /// Court whose current match is addressed.
    #[validate(range(min = 1))]
    pub court_id: CourtId,
    /// Match the operator screen believes is current; rejected when stale.
    pub match_id: Option<MatchId>,
}

/// Result of a set-win confirmation.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmSetResponse {
    /// `false` when no set-deciding score was pending.
    pub confirmed: bool,
    /// The confirmed set decided the match.
    pub match_completed: bool,
    /// Webhook result when this confirmation completed the match.
    pub end_notification: Option<NotificationOutcome>,
    /// Court snapshot after the confirmation.
    pub snapshot: ScoreUpdatePayload,
}
