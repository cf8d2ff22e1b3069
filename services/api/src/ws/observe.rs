//! The passive observer feed: a read-only WebSocket mirroring session state.

use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument, warn};

/// Axum handler to upgrade an HTTP connection to an observer WebSocket.
pub async fn observe_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_observer(socket, state))
}

/// Forwards broadcast state updates until either side disconnects.
///
/// A slow observer only loses its own events; it can never push back on the
/// sessions producing them.
#[instrument(name = "observer", skip_all)]
async fn handle_observer(mut socket: WebSocket, state: Arc<AppState>) {
    let mut events = state.registry.subscribe();
    info!("observer connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(message) => {
                        let Ok(text) = serde_json::to_string(&message) else {
                            continue;
                        };
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "observer fell behind the broadcast");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    // the feed is one-way; anything but a close is dropped
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => debug!("ignoring inbound frame on the observer feed"),
                    Some(Err(_)) => break,
                }
            }
        }
    }

    info!("observer disconnected");
}
