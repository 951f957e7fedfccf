//! WebSocket notification stream.
//!
//! Each connection forwards the caller's private channel from the hub. A
//! user with several open connections receives every message on each.

use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extract::Actor;
use crate::state::AppState;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong before the connection is considered dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

/// GET /ws
async fn subscribe(
    State(state): State<AppState>,
    Actor(user_id): Actor,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.hub.subscribe(user_id);
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| async move {
        info!(user_id = %user_id, "notification stream opened");
        let (sender, receiver) = socket.split();
        // The loop owns `rx`, so the receiver is gone once it returns.
        run_socket_loop(user_id, sender, receiver, rx).await;
        hub.release(user_id);
        info!(user_id = %user_id, "notification stream closed");
    })
}

/// Forwards channel messages and keeps the connection alive until either
/// side goes away.
async fn run_socket_loop(
    user_id: Uuid,
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick is immediate.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    debug!(user_id = %user_id, "pong timeout");
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(user_id = %user_id, skipped, "subscriber lagged, notifications lost");
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

/// Returns the router for the notification stream.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(subscribe))
}
