//! Point scoring operations on the current match of a court.

use std::time::SystemTime;

use tracing::{debug, info};
use validator::Validate;

use crate::{
    dao::{
        models::{CourtEntity, CourtId, MatchEntity, MatchId, ScoreStateEntity},
        score_store::ScoreboardStore,
    },
    dto::score::{ConfirmSetResponse, CourtRequest, PointRequest, ScoreUpdatePayload},
    error::ServiceError,
    services::match_service::{ensure_court_id, find_court, finish_match},
    state::{
        SharedState,
        court_phase::{CourtEvent, CourtPhase},
        score_engine::{Scoreboard, SetOutcome},
    },
};

/// Court together with its current match and live score.
struct CurrentMatch {
    court: CourtEntity,
    match_entity: MatchEntity,
    score: ScoreStateEntity,
}

impl CurrentMatch {
    fn board(&self) -> Scoreboard {
        Scoreboard::from_entities(&self.match_entity, &self.score)
    }

    fn apply(&mut self, board: &Scoreboard) {
        board.write_back(&mut self.match_entity, &mut self.score);
        self.score.updated_at = SystemTime::now();
    }

    fn snapshot(&self, state: &SharedState) -> ScoreUpdatePayload {
        ScoreUpdatePayload::build(
            self.court.id,
            &self.match_entity,
            &self.score,
            state.set_history().list(self.match_entity.id),
        )
    }
}

async fn load_current(
    store: &dyn ScoreboardStore,
    court_id: CourtId,
    expected: Option<MatchId>,
) -> Result<CurrentMatch, ServiceError> {
    let court = find_court(store, court_id).await?;
    let match_id = court
        .current_match_id
        .ok_or_else(|| ServiceError::NotFound(format!("court {court_id} has no current match")))?;

    if let Some(expected) = expected.filter(|expected| *expected != match_id) {
        return Err(ServiceError::InvalidState(format!(
            "match {expected} is no longer current on court {court_id} (current: {match_id})"
        )));
    }

    let match_entity = store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match {match_id} not found")))?;
    let score = store
        .find_score_state(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("score state of match {match_id} not found")))?;

    Ok(CurrentMatch {
        court,
        match_entity,
        score,
    })
}

/// Load, change, persist and broadcast under the court lock.
async fn update_board<F>(
    state: &SharedState,
    court_id: CourtId,
    expected: Option<MatchId>,
    change: F,
) -> Result<ScoreUpdatePayload, ServiceError>
where
    F: FnOnce(&mut Scoreboard) + Send,
{
    ensure_court_id(state, court_id)?;
    let store = state.require_store().await?;

    state
        .run_exclusive(court_id, || async move {
            let mut current = load_current(store.as_ref(), court_id, expected).await?;
            if current.match_entity.is_completed {
                return Err(ServiceError::InvalidState(format!(
                    "match {} is already completed",
                    current.match_entity.id
                )));
            }

            let mut board = current.board();
            change(&mut board);
            current.apply(&board);
            store
                .save_match_state(current.match_entity.clone(), current.score.clone())
                .await?;

            let snapshot = current.snapshot(state);
            state.hub().broadcast(snapshot.clone()).await;
            Ok(snapshot)
        })
        .await
}

/// Add a point; a set-deciding score is flagged as pending, never applied.
pub async fn increment_point(
    state: &SharedState,
    request: PointRequest,
) -> Result<ScoreUpdatePayload, ServiceError> {
    request.validate()?;
    let team = request.team;
    update_board(state, request.court_id, request.match_id, move |board| {
        board.increment(team);
    })
    .await
}

/// Remove a point, clamped at zero; may clear a pending set win.
pub async fn decrement_point(
    state: &SharedState,
    request: PointRequest,
) -> Result<ScoreUpdatePayload, ServiceError> {
    request.validate()?;
    let team = request.team;
    update_board(state, request.court_id, request.match_id, move |board| {
        board.decrement(team);
    })
    .await
}

/// Zero both scores of the current set.
pub async fn reset_current_set(
    state: &SharedState,
    request: CourtRequest,
) -> Result<ScoreUpdatePayload, ServiceError> {
    request.validate()?;
    update_board(state, request.court_id, request.match_id, Scoreboard::reset_set).await
}

/// Exchange team names and scores of the current match.
pub async fn swap_sides(
    state: &SharedState,
    request: CourtRequest,
) -> Result<ScoreUpdatePayload, ServiceError> {
    request.validate()?;
    update_board(state, request.court_id, request.match_id, Scoreboard::swap_sides).await
}

/// Close the current set if a winner is established at call time.
///
/// Calling it again after the set advanced finds nothing pending and changes
/// nothing. When the winner reaches the set threshold the match is marked
/// completed and the completion side effects run.
pub async fn confirm_set_win(
    state: &SharedState,
    request: CourtRequest,
) -> Result<ConfirmSetResponse, ServiceError> {
    request.validate()?;
    let court_id = request.court_id;
    let expected = request.match_id;
    let store = state.require_store().await?;

    state
        .run_exclusive(court_id, || async move {
            let mut current = load_current(store.as_ref(), court_id, expected).await?;
            let phase = CourtPhase::resolve(&current.court, Some(&current.match_entity));

            let mut board = current.board();
            let SetOutcome::Confirmed {
                winner,
                final_score,
                match_completed,
            } = board.confirm_set_win()
            else {
                return Ok(ConfirmSetResponse {
                    confirmed: false,
                    match_completed: current.match_entity.is_completed,
                    end_notification: None,
                    snapshot: current.snapshot(state),
                });
            };

            if match_completed {
                phase.next(CourtEvent::CompleteMatch)?;
            }

            current.apply(&board);
            store
                .save_match_state(current.match_entity.clone(), current.score.clone())
                .await?;
            state
                .set_history()
                .append(current.match_entity.id, final_score);

            info!(
                court_id,
                match_id = current.match_entity.id,
                ?winner,
                sets_a = current.match_entity.sets_a,
                sets_b = current.match_entity.sets_b,
                match_completed,
                "set confirmed"
            );

            let end_notification = if match_completed {
                Some(finish_match(state, store.as_ref(), &current.court, &current.match_entity).await)
            } else {
                None
            };

            let snapshot = current.snapshot(state);
            state.hub().broadcast(snapshot.clone()).await;

            Ok(ConfirmSetResponse {
                confirmed: true,
                match_completed,
                end_notification,
                snapshot,
            })
        })
        .await
}

/// Authoritative snapshot of a court, recomputed from durable state.
pub async fn current_snapshot(
    state: &SharedState,
    court_id: CourtId,
) -> Result<ScoreUpdatePayload, ServiceError> {
    ensure_court_id(state, court_id)?;
    let store = state.require_store().await?;

    state
        .run_exclusive(court_id, || async move {
            let current = load_current(store.as_ref(), court_id, None).await?;
            Ok(current.snapshot(state))
        })
        .await
}

/// Snapshot served to a viewer joining a court: the cached one when present,
/// otherwise recomputed. `None` when the court has nothing to show.
pub async fn viewer_snapshot(state: &SharedState, court_id: CourtId) -> Option<ScoreUpdatePayload> {
    if let Some(cached) = state.hub().cached(court_id).await {
        return Some(cached);
    }
    match current_snapshot(state, court_id).await {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            debug!(court_id, error = %err, "no snapshot to serve to viewer");
            None
        }
    }
}
