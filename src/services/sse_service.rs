use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dao::models::CourtId, dto::score::ScoreUpdatePayload, services::score_service,
    state::SharedState,
};

/// Event name carried by every snapshot on the stream.
pub const SCORE_UPDATE_EVENT: &str = "score-update";

/// Subscription of one SSE client: the updates receiver plus the snapshot to
/// send first.
pub struct CourtSubscription {
    /// Court followed by the client.
    pub court_id: CourtId,
    /// Live updates of the court.
    pub receiver: broadcast::Receiver<Arc<ScoreUpdatePayload>>,
    /// Current snapshot; `None` when no match is bound.
    pub initial: Option<ScoreUpdatePayload>,
}

fn score_event(payload: &ScoreUpdatePayload) -> Option<Event> {
    match Event::default().event(SCORE_UPDATE_EVENT).json_data(payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to encode score update event");
            None
        }
    }
}

/// Subscribe to a court before reading its snapshot so no update falls in between.
pub async fn subscribe(state: &SharedState, court_id: CourtId) -> CourtSubscription {
    let receiver = state.hub().subscribe(court_id);
    let initial = score_service::viewer_snapshot(state, court_id).await;
    CourtSubscription {
        court_id,
        receiver,
        initial,
    }
}

/// Turn a court subscription into an SSE response: the current snapshot first,
/// then every update until the client goes away.
pub fn to_sse_stream(
    subscription: CourtSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let CourtSubscription {
        court_id,
        mut receiver,
        initial,
    } = subscription;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(event) = initial.as_ref().and_then(score_event) {
            if tx.send(Ok(event)).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let Some(event) = score_event(&payload) else {
                                continue;
                            };
                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // Skip lagged messages but keep the stream alive.
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }

        info!(court_id, "court SSE stream disconnected");
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;
    use futures::StreamExt;

    use super::*;
    use crate::{
        dto::score::PointRequest,
        services::{
            match_service,
            test_support::{memory_state, seed_match},
        },
        state::score_engine::Team,
    };

    #[tokio::test]
    async fn stream_sends_snapshot_then_updates() {
        let (state, store) = memory_state().await;
        let entity = seed_match(&store, 3, "Alpha", "Bravo", false).await;
        match_service::advance(&state, 3).await.unwrap();

        let subscription = subscribe(&state, 3).await;
        assert_eq!(subscription.initial.as_ref().unwrap().match_id, entity.id);
        let mut body = to_sse_stream(subscription)
            .into_response()
            .into_body()
            .into_data_stream();

        let first = body.next().await.unwrap().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.starts_with("event: score-update"));
        assert!(first.contains("\"teamAScore\":0"));

        let request = PointRequest {
            court_id: 3,
            team: Team::A,
            match_id: None,
        };
        score_service::increment_point(&state, request).await.unwrap();

        let update = body.next().await.unwrap().unwrap();
        let update = String::from_utf8(update.to_vec()).unwrap();
        assert!(update.contains("\"teamAScore\":1"));
    }

    #[tokio::test]
    async fn court_without_match_has_no_initial_snapshot() {
        let (state, _) = memory_state().await;
        assert!(subscribe(&state, 2).await.initial.is_none());
    }
}
