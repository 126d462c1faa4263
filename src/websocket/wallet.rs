use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    api::AppState,
    constants::WS_HEARTBEAT_INTERVAL_SECS,
    services::StoreEvent,
};

fn connected_payload() -> String {
    serde_json::json!({
        "type": "connected",
        "message": "Connected to wallet stream"
    })
    .to_string()
}

fn heartbeat_payload() -> String {
    serde_json::json!({
        "type": "heartbeat",
        "timestamp": chrono::Utc::now().timestamp(),
    })
    .to_string()
}

fn event_payload(event: &StoreEvent) -> String {
    serde_json::to_string(event).unwrap_or_default()
}

/// WebSocket handler streaming wallet snapshot and transaction events
pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.store.subscribe();

    let _ = sender.send(Message::Text(connected_payload().into())).await;
    let initial = StoreEvent::SnapshotUpdated {
        snapshot: state.store.snapshot().await,
    };
    if sender
        .send(Message::Text(event_payload(&initial).into()))
        .await
        .is_err()
    {
        return;
    }

    let store = state.store.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat =
            tokio::time::interval(tokio::time::Duration::from_secs(WS_HEARTBEAT_INTERVAL_SECS));
        heartbeat.tick().await;

        loop {
            let payload = tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => event_payload(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed events are covered by a full snapshot.
                        tracing::warn!("Wallet stream lagged by {} events", skipped);
                        event_payload(&StoreEvent::SnapshotUpdated {
                            snapshot: store.snapshot().await,
                        })
                    }
                    Err(RecvError::Closed) => return,
                },
                _ = heartbeat.tick() => heartbeat_payload(),
            };

            if sender.send(Message::Text(payload.into())).await.is_err() {
                return;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                tracing::info!("Wallet stream client disconnected");
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::info!("Wallet WebSocket connection closed");
}
