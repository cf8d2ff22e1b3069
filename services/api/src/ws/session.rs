//! Manages the media-stream WebSocket lifecycle for one interview call.

use super::bridge;
use crate::state::AppState;
use crate::ws::protocol::{TransportFrame, TransportReply};
use anyhow::{Result, bail};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a media-stream WebSocket.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_stream(socket, state))
}

/// Entry point for a new media stream.
///
/// Waits for the gateway's `start` frame to capture the stream id (outbound
/// audio cannot be addressed without it), registers the session, and then
/// hands the socket to the bridge loop.
#[instrument(name = "media_stream", skip_all, fields(session_id))]
async fn handle_stream(mut socket: WebSocket, state: Arc<AppState>) {
    info!("new media stream connection; awaiting start frame");

    let stream_sid = match await_stream_start(&mut socket).await {
        Ok(Some(stream_sid)) => stream_sid,
        Ok(None) => {
            info!("stream closed before announcing itself");
            return;
        }
        Err(e) => {
            warn!(error = ?e, "media stream handshake failed");
            let reply = TransportReply::Error {
                message: e.to_string(),
            };
            if let Ok(text) = serde_json::to_string(&reply) {
                let _ = socket.send(Message::Text(text.into())).await;
            }
            return;
        }
    };

    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", &session_id.to_string());
    info!(%stream_sid, "interview session starting");

    let (command_tx, command_rx) = mpsc::channel(4);
    state.registry.register(session_id, command_tx);

    // The bridge owns the call from here. Whatever way it exits, the
    // registry entry goes with it.
    let session_span = tracing::info_span!("interview", %session_id);
    tokio::spawn(
        async move {
            if let Err(e) =
                bridge::run(state.clone(), socket, session_id, stream_sid, command_rx).await
            {
                error!(error = ?e, "interview session terminated with error");
            }
            state.registry.remove(session_id);
            info!("interview session finished");
        }
        .instrument(session_span),
    );
}

/// Reads frames until the gateway announces the stream.
///
/// Bookkeeping frames ahead of `start` are skipped. Media before `start` is
/// a protocol error: outbound frames cannot be addressed yet.
async fn await_stream_start(socket: &mut WebSocket) -> Result<Option<String>> {
    while let Some(message) = socket.recv().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => return Ok(None),
            _ => continue,
        };
        match serde_json::from_str::<TransportFrame>(&text) {
            Ok(TransportFrame::Start { start }) => return Ok(Some(start.stream_sid)),
            Ok(TransportFrame::Stop) => return Ok(None),
            Ok(TransportFrame::Ignored) => continue,
            Ok(TransportFrame::Media { .. }) => bail!("media frame arrived before start"),
            Err(e) => bail!("unparseable frame before start: {e}"),
        }
    }
    Ok(None)
}
