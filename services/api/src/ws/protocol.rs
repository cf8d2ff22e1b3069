//! Wire formats for the two WebSocket surfaces the service exposes: the
//! telephony media stream that carries the call, and the passive observer
//! feed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use viva_core::transcript::Turn;

/// Frames received from the telephony media stream.
///
/// Gateways interleave bookkeeping events (`connected`, `mark`, ...) with the
/// ones the bridge acts on; anything with a well-formed but unmodeled tag
/// parses as [`TransportFrame::Ignored`]. Frames that fail to parse at all
/// are rejected with an explicit [`TransportReply::Error`].
#[derive(Deserialize, Debug)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TransportFrame {
    /// Stream setup. Must arrive before any media; carries the stream id
    /// needed to address outbound frames.
    Start { start: StreamStart },
    /// One chunk of caller audio, base64 payload, relayed verbatim.
    Media { media: MediaPayload },
    /// The gateway ended the stream.
    Stop,
    #[serde(other)]
    Ignored,
}

#[derive(Deserialize, Debug)]
pub struct StreamStart {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
}

#[derive(Deserialize, Debug)]
pub struct MediaPayload {
    pub payload: String,
}

/// Frames sent back to the telephony media stream.
#[derive(Serialize, Debug)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TransportReply {
    /// One chunk of interviewer audio, addressed to the live stream.
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaOut,
    },
    /// Explicit rejection of an unparseable inbound frame.
    Error { message: String },
}

#[derive(Serialize, Debug)]
pub struct MediaOut {
    pub payload: String,
}

impl TransportReply {
    pub fn media(stream_sid: &str, payload: String) -> Self {
        Self::Media {
            stream_sid: stream_sid.to_string(),
            media: MediaOut { payload },
        }
    }
}

/// Frames pushed to passive subscribers on the `/observe` socket.
///
/// Best-effort fan-out: observers receive every stage or instruction change,
/// but a slow or absent observer never affects the interview path.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ObserverMessage {
    StateUpdate {
        session_id: Uuid,
        stage: String,
        active_instruction: String,
        critique: Option<String>,
        instruction_history: Vec<String>,
        transcript: Vec<Turn>,
        concluded: bool,
    },
}
