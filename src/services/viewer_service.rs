//! Viewer WebSocket sessions: court subscriptions over a single socket.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::CourtId,
    dto::ws::{ViewerInboundMessage, ViewerOutboundMessage},
    services::{match_service::ensure_court_id, score_service},
    state::SharedState,
};

/// Handle the full lifecycle of a viewer WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    info!(%connection_id, "viewer connected");
    let mut subscriptions: HashMap<CourtId, JoinHandle<()>> = HashMap::new();

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ViewerInboundMessage::from_json_str(&text) {
                Ok(ViewerInboundMessage::Join { court_id, scope }) => {
                    join_court(&state, court_id, scope, &outbound_tx, &mut subscriptions).await;
                }
                Ok(ViewerInboundMessage::Leave { court_id }) => {
                    if let Some(forwarder) = subscriptions.remove(&court_id) {
                        forwarder.abort();
                    }
                    send_message(&outbound_tx, &ViewerOutboundMessage::Left { court_id });
                }
                Err(err) => {
                    warn!(%connection_id, error = %err, "failed to parse viewer message");
                    send_message(
                        &outbound_tx,
                        &ViewerOutboundMessage::Error {
                            message: format!("unrecognised message: {err}"),
                        },
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    for (_, forwarder) in subscriptions.drain() {
        forwarder.abort();
    }
    info!(%connection_id, "viewer disconnected");

    finalize(writer_task, outbound_tx).await;
}

async fn join_court(
    state: &SharedState,
    court_id: CourtId,
    scope: Option<String>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    subscriptions: &mut HashMap<CourtId, JoinHandle<()>>,
) {
    let instance_scope = state.hub().scope();
    if let Some(requested) = scope.as_deref().filter(|scope| *scope != instance_scope) {
        send_message(
            outbound_tx,
            &ViewerOutboundMessage::Error {
                message: format!("scope `{requested}` is not served here"),
            },
        );
        return;
    }
    if let Err(err) = ensure_court_id(state, court_id) {
        send_message(
            outbound_tx,
            &ViewerOutboundMessage::Error {
                message: err.to_string(),
            },
        );
        return;
    }

    // Subscribe before reading the snapshot so no update falls in between.
    let mut updates = state.hub().subscribe(court_id);
    send_message(outbound_tx, &ViewerOutboundMessage::Joined { court_id });
    if let Some(snapshot) = score_service::viewer_snapshot(state, court_id).await {
        send_message(outbound_tx, &ViewerOutboundMessage::ScoreUpdate { data: snapshot });
    }

    let tx = outbound_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(payload) => {
                    let message = ViewerOutboundMessage::ScoreUpdate {
                        data: payload.as_ref().clone(),
                    };
                    if !send_message(&tx, &message) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(court_id, skipped, "viewer lagged behind court updates");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Some(previous) = subscriptions.insert(court_id, forwarder) {
        previous.abort();
    }
}

/// Serialize a message onto the writer channel. Returns `false` once the writer is gone.
fn send_message(tx: &mpsc::UnboundedSender<Message>, message: &ViewerOutboundMessage) -> bool {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize viewer message");
            return true;
        }
    };
    tx.send(Message::Text(payload.into())).is_ok()
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        match_service,
        test_support::{memory_state, seed_match},
    };

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
        let mut messages = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            messages.push(serde_json::from_str(text.as_str()).unwrap());
        }
        messages
    }

    #[tokio::test]
    async fn join_outside_configured_courts_leaves_no_channel_behind() {
        let (state, _) = memory_state().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subscriptions = HashMap::new();

        join_court(&state, 4_000_000, None, &tx, &mut subscriptions).await;

        assert!(subscriptions.is_empty());
        assert!(!state.hub().has_channel(4_000_000));
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["event"], "error");
    }

    #[tokio::test]
    async fn join_sends_snapshot_of_current_match() {
        let (state, store) = memory_state().await;
        let entity = seed_match(&store, 2, "Alpha", "Bravo", false).await;
        match_service::advance(&state, 2).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subscriptions = HashMap::new();

        join_court(&state, 2, Some("default".into()), &tx, &mut subscriptions).await;

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["event"], "joined");
        assert_eq!(messages[1]["event"], "score-update");
        assert_eq!(messages[1]["data"]["matchId"], entity.id);
        for (_, forwarder) in subscriptions.drain() {
            forwarder.abort();
        }
    }
}
