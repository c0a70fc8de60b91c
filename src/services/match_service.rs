//! Court lifecycle: binding the next match and finishing the current one.

use std::time::SystemTime;

use tracing::{info, warn};

use crate::{
    dao::{
        models::{CourtEntity, CourtId, MatchEntity, MatchLogEntity, ScoreStateEntity},
        score_store::{ScoreboardStore, next_match},
    },
    dto::{
        court::{AdvanceReport, AdvanceResponse, MatchLogSummary, MatchSummary, NotificationOutcome},
        score::ScoreUpdatePayload,
    },
    error::ServiceError,
    state::{
        SharedState,
        court_phase::{CourtEvent, CourtPhase},
    },
};

const DEFAULT_UPCOMING_LIMIT: usize = 5;
const MAX_UPCOMING_LIMIT: usize = 100;

/// Bind the next pending match of a court and announce it.
///
/// Durable steps (completing the previous match, fresh score state, court
/// pointer, match log) fail the call. Recorder and webhook results are only
/// reported in the response.
pub async fn advance(state: &SharedState, court_id: CourtId) -> Result<AdvanceResponse, ServiceError> {
    ensure_court_id(state, court_id)?;
    let store = state.require_store().await?;

    state
        .run_exclusive(court_id, || async move {
            let court = find_court(store.as_ref(), court_id).await?;
            let current = match court.current_match_id {
                Some(id) => store.find_match(id).await?,
                None => None,
            };
            let phase = CourtPhase::resolve(&court, current.as_ref());

            if let CourtPhase::Active { match_id } = phase {
                info!(court_id, match_id, "advance ignored; current match still in progress");
                return Ok(AdvanceResponse::AlreadyInProgress { match_id });
            }

            if let (CourtPhase::Completed { .. }, Some(mut previous)) = (phase, current) {
                previous.is_completed = true;
                store.save_match(previous).await?;
            }

            let next = next_match(store.as_ref(), court_id).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("no pending match for court {court_id}"))
            })?;
            let next_phase = phase.next(CourtEvent::Advance {
                next_match_id: next.id,
            })?;

            state.set_history().clear(next.id);

            let score = ScoreStateEntity::fresh(next.id);
            store.upsert_score_state(score.clone()).await?;

            if !store.set_current_match(court_id, Some(next.id)).await? {
                return Err(ServiceError::NotFound(format!("court {court_id} not found")));
            }

            store
                .open_match_log(MatchLogEntity::open(court_id, &next))
                .await?;

            info!(
                court_id,
                match_id = next.id,
                from = ?phase,
                to = ?next_phase,
                "court advanced to next match"
            );

            let recorder = state
                .recorder()
                .start(court_id, next.id, court.recorder_device_id.as_deref())
                .await;
            if !recorder.success {
                warn!(court_id, match_id = next.id, message = %recorder.message, "recorder start not confirmed");
            }

            let notification = state
                .notifier()
                .send_start(court_id, next.external_match_id.as_deref())
                .await;

            let snapshot = ScoreUpdatePayload::build(court_id, &next, &score, Vec::new());
            state.hub().broadcast(snapshot.clone()).await;

            Ok(AdvanceResponse::Advanced(AdvanceReport {
                court_id,
                previous_match_id: phase.current_match_id(),
                snapshot,
                recorder,
                notification,
            }))
        })
        .await
}

/// Side effects of a match reaching its set threshold: close the match log,
/// notify the operations hub and stop the recorder in the background.
///
/// The court keeps pointing at the finished match until the next advance.
pub(crate) async fn finish_match(
    state: &SharedState,
    store: &dyn ScoreboardStore,
    court: &CourtEntity,
    finished: &MatchEntity,
) -> NotificationOutcome {
    match store.close_match_log(finished.id, SystemTime::now()).await {
        Ok(0) => warn!(court_id = court.id, match_id = finished.id, "no open match log to close"),
        Ok(closed) => info!(court_id = court.id, match_id = finished.id, closed, "match log closed"),
        Err(err) => warn!(
            court_id = court.id,
            match_id = finished.id,
            error = %err,
            "failed to close match log"
        ),
    }

    let notification = state
        .notifier()
        .send_end(court.id, finished.external_match_id.as_deref())
        .await;

    let recorder = state.recorder().clone();
    let (court_id, match_id) = (court.id, finished.id);
    let device_id = court.recorder_device_id.clone();
    tokio::spawn(async move {
        let outcome = recorder.stop(court_id, match_id, device_id.as_deref()).await;
        if outcome.success {
            info!(court_id, match_id, "recorder stopped");
        } else {
            warn!(court_id, match_id, message = %outcome.message, "recorder stop not confirmed");
        }
    });

    notification
}

/// Pending matches of a court in play order.
pub async fn upcoming_matches(
    state: &SharedState,
    court_id: CourtId,
    limit: Option<usize>,
) -> Result<Vec<MatchSummary>, ServiceError> {
    ensure_court_id(state, court_id)?;
    let store = state.require_store().await?;
    find_court(store.as_ref(), court_id).await?;

    let limit = limit
        .unwrap_or(DEFAULT_UPCOMING_LIMIT)
        .min(MAX_UPCOMING_LIMIT);
    let matches = store.upcoming_matches(court_id, limit).await?;
    Ok(matches.into_iter().map(MatchSummary::from).collect())
}

/// Every match log ordered by start time.
pub async fn match_logs(state: &SharedState) -> Result<Vec<MatchLogSummary>, ServiceError> {
    let store = state.require_store().await?;
    let logs = store.list_match_logs().await?;
    Ok(logs.into_iter().map(MatchLogSummary::from).collect())
}

/// Reject court ids outside `1..=court_count` before they reach the store,
/// the lock registry or the viewer channels.
pub(crate) fn ensure_court_id(state: &SharedState, court_id: CourtId) -> Result<(), ServiceError> {
    if court_id == 0 {
        return Err(ServiceError::InvalidInput("court ids start at 1".into()));
    }
    if court_id > state.config().court_count {
        return Err(ServiceError::NotFound(format!("court {court_id} not found")));
    }
    Ok(())
}

pub(crate) async fn find_court(
    store: &dyn ScoreboardStore,
    court_id: CourtId,
) -> Result<CourtEntity, ServiceError> {
    store
        .find_court(court_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("court {court_id} not found")))
}
