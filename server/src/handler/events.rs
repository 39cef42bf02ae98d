//! `GET /ws`: pushes transfer updates to a browser.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tracing::{debug, info};

use crate::state::AppState;

pub async fn ws(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| forward_updates(socket, state))
}

/// Relay broadcaster messages to one socket until either side goes away
/// or the server shuts down. Incoming frames are read only to notice a
/// close.
async fn forward_updates(mut socket: WebSocket, state: AppState) {
    let (subscriber, mut rx) = state.broadcaster.subscribe();
    info!(subscriber, "Event socket opened");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            update = rx.recv() => {
                let Some(payload) = update else { break };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(subscriber, "Event socket error: {e}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.broadcaster.unsubscribe(subscriber);
    info!(subscriber, "Event socket closed");
}
