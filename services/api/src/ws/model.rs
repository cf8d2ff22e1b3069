//! Typed client for the upstream realtime voice session.
//!
//! Everything that crosses the model socket is expressed here as a tagged
//! variant; the bridge never touches raw JSON. Inbound events the bridge has
//! no handling for parse as [`ModelEvent::Unhandled`] so a vocabulary
//! addition upstream cannot break a live call.

use crate::config::Config;
use anyhow::{Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use schemars::schema_for;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::info;
use viva_core::tools;

pub type ModelSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type ModelSink = SplitSink<ModelSocket, WsMessage>;
pub type ModelStream = SplitStream<ModelSocket>;

/// Events sent to the model.
#[derive(Serialize, Debug)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend { audio: String },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    #[serde(rename = "response.create")]
    ResponseCreate {},
}

/// The full session configuration.
///
/// Sent once after connect and then again, in full, on every instruction
/// change; the model applies the latest configuration to the next response.
#[derive(Serialize, Debug)]
pub struct SessionConfig {
    pub voice: String,
    pub instructions: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub modalities: Vec<String>,
    pub turn_detection: TurnDetection,
    pub input_audio_transcription: TranscriptionConfig,
    pub max_response_output_tokens: u32,
    pub tools: Vec<ToolSpec>,
    pub tool_choice: String,
}

#[derive(Serialize, Debug)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

#[derive(Serialize, Debug)]
pub struct TranscriptionConfig {
    pub model: String,
}

#[derive(Serialize, Debug)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl SessionConfig {
    /// The interview session: telephony audio both ways, server-side turn
    /// detection tuned for a caller who pauses to think, and the two
    /// capabilities registered from their shared schema definitions.
    pub fn for_interview(voice: &str, instructions: &str) -> Self {
        Self {
            voice: voice.to_string(),
            instructions: instructions.to_string(),
            input_audio_format: "g711_ulaw".to_string(),
            output_audio_format: "g711_ulaw".to_string(),
            modalities: vec!["text".to_string(), "audio".to_string()],
            turn_detection: TurnDetection {
                kind: "server_vad".to_string(),
                threshold: 0.7,
                prefix_padding_ms: 300,
                silence_duration_ms: 1500,
            },
            input_audio_transcription: TranscriptionConfig {
                model: "whisper-1".to_string(),
            },
            max_response_output_tokens: 300,
            tools: vec![
                ToolSpec {
                    kind: "function".to_string(),
                    name: tools::CONSULT_SENIOR.to_string(),
                    description: tools::CONSULT_SENIOR_DESCRIPTION.to_string(),
                    parameters: schema_for!(tools::ConsultSeniorArgs).to_value(),
                },
                ToolSpec {
                    kind: "function".to_string(),
                    name: tools::REQUEST_NEXT_STAGE.to_string(),
                    description: tools::REQUEST_NEXT_STAGE_DESCRIPTION.to_string(),
                    parameters: schema_for!(tools::RequestNextStageArgs).to_value(),
                },
            ],
            tool_choice: "auto".to_string(),
        }
    }
}

/// Items placed into the model's conversation.
#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    Message {
        role: String,
        content: Vec<ContentPart>,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
}

impl ConversationItem {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::Message {
            role: "user".to_string(),
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    pub fn tool_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallOutput {
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

/// Events received from the model.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ModelEvent {
    #[serde(rename = "session.created")]
    SessionCreated {},
    #[serde(rename = "session.updated")]
    SessionUpdated {},
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {},
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {},
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted { transcript: String },
    #[serde(rename = "response.audio_transcript.done")]
    ResponseTranscriptDone { transcript: String },
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: ResponseSummary,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: ModelError,
    },
    #[serde(other)]
    Unhandled,
}

/// The slice of a completed response the bridge inspects: its output items,
/// which is where function calls surface.
#[derive(Deserialize, Debug, Default)]
pub struct ResponseSummary {
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    FunctionCall {
        name: String,
        call_id: String,
        arguments: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Default)]
pub struct ModelError {
    #[serde(default)]
    pub message: String,
}

/// Opens the realtime WebSocket and splits it for the bridge's event loop.
pub async fn connect(config: &Config) -> Result<(ModelSink, ModelStream)> {
    let url = format!(
        "wss://api.openai.com/v1/realtime?model={}",
        config.realtime_model
    );
    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {}", config.openai_api_key).parse()?);
    request
        .headers_mut()
        .insert("OpenAI-Beta", "realtime=v1".parse()?);

    let (ws_stream, _) = connect_async(request)
        .await
        .context("failed to connect to the realtime voice API")?;
    info!(model = %config.realtime_model, "connected to the realtime voice API");
    Ok(ws_stream.split())
}

pub async fn send_event(sink: &mut ModelSink, event: &ClientEvent) -> Result<()> {
    let text = serde_json::to_string(event)?;
    sink.send(WsMessage::Text(text.into()))
        .await
        .context("failed to send event to the realtime session")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_update_carries_the_full_interview_configuration() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig::for_interview("alloy", "Be brief."),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "session.update");
        let session = &json["session"];
        assert_eq!(session["voice"], "alloy");
        assert_eq!(session["instructions"], "Be brief.");
        assert_eq!(session["input_audio_format"], "g711_ulaw");
        assert_eq!(session["output_audio_format"], "g711_ulaw");
        assert_eq!(session["turn_detection"]["type"], "server_vad");
        assert_eq!(session["turn_detection"]["silence_duration_ms"], 1500);
        assert_eq!(session["input_audio_transcription"]["model"], "whisper-1");
        assert_eq!(session["max_response_output_tokens"], 300);
        assert_eq!(session["tool_choice"], "auto");
    }

    #[test]
    fn both_capabilities_are_registered_with_their_schemas() {
        let session = SessionConfig::for_interview("alloy", "x");
        let names: Vec<&str> = session.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, [tools::CONSULT_SENIOR, tools::REQUEST_NEXT_STAGE]);

        for tool in &session.tools {
            assert_eq!(tool.kind, "function");
            assert_eq!(tool.parameters["type"], "object");
        }
        assert!(
            session.tools[1].parameters["properties"]["reason"].is_object(),
            "stage request schema must declare its reason field"
        );
        assert!(session.tools[0].parameters["properties"]["question"].is_object());
    }

    #[test]
    fn conversation_items_serialize_in_wire_shape() {
        let greeting = ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text("Hello!"),
        };
        let json = serde_json::to_value(&greeting).unwrap();
        assert_eq!(json["type"], "conversation.item.create");
        assert_eq!(json["item"]["type"], "message");
        assert_eq!(json["item"]["role"], "user");
        assert_eq!(json["item"]["content"][0]["type"], "input_text");
        assert_eq!(json["item"]["content"][0]["text"], "Hello!");

        let output = ClientEvent::ConversationItemCreate {
            item: ConversationItem::tool_output("call_7", r#"{"status":"ok"}"#),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["item"]["type"], "function_call_output");
        assert_eq!(json["item"]["call_id"], "call_7");
        assert_eq!(json["item"]["output"], r#"{"status":"ok"}"#);
    }

    #[test]
    fn audio_append_is_flat() {
        let event = ClientEvent::InputAudioAppend {
            audio: "AAAA".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "input_audio_buffer.append");
        assert_eq!(json["audio"], "AAAA");
    }

    #[test]
    fn lifecycle_events_parse_despite_unmodeled_payload() {
        let event: ModelEvent = serde_json::from_str(
            r#"{"type":"session.created","event_id":"ev_1","session":{"id":"sess_1"}}"#,
        )
        .unwrap();
        assert!(matches!(event, ModelEvent::SessionCreated {}));

        let event: ModelEvent =
            serde_json::from_str(r#"{"type":"session.updated","session":{}}"#).unwrap();
        assert!(matches!(event, ModelEvent::SessionUpdated {}));
    }

    #[test]
    fn transcript_events_surface_their_text() {
        let event: ModelEvent = serde_json::from_str(
            r#"{"type":"conversation.item.input_audio_transcription.completed","item_id":"it_1","transcript":"I work on storage systems."}"#,
        )
        .unwrap();
        match event {
            ModelEvent::InputTranscriptionCompleted { transcript } => {
                assert_eq!(transcript, "I work on storage systems.")
            }
            other => panic!("unexpected event {other:?}"),
        }

        let event: ModelEvent = serde_json::from_str(
            r#"{"type":"response.audio_transcript.done","transcript":"Tell me more."}"#,
        )
        .unwrap();
        assert!(matches!(event, ModelEvent::ResponseTranscriptDone { .. }));
    }

    #[test]
    fn function_calls_surface_in_completed_responses() {
        let event: ModelEvent = serde_json::from_str(
            r#"{
                "type": "response.done",
                "response": {
                    "status": "completed",
                    "output": [
                        {"type": "message", "role": "assistant"},
                        {"type": "function_call", "name": "request_next_stage",
                         "call_id": "call_9", "arguments": "{\"reason\":\"intro done\"}"}
                    ]
                }
            }"#,
        )
        .unwrap();

        let ModelEvent::ResponseDone { response } = event else {
            panic!("expected response.done");
        };
        assert_eq!(response.output.len(), 2);
        assert!(matches!(response.output[0], OutputItem::Other));
        match &response.output[1] {
            OutputItem::FunctionCall { name, call_id, arguments } => {
                assert_eq!(name, "request_next_stage");
                assert_eq!(call_id, "call_9");
                assert!(arguments.contains("intro done"));
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn bare_response_done_defaults_to_no_output() {
        let event: ModelEvent = serde_json::from_str(r#"{"type":"response.done"}"#).unwrap();
        let ModelEvent::ResponseDone { response } = event else {
            panic!("expected response.done");
        };
        assert!(response.output.is_empty());
    }

    #[test]
    fn unknown_event_types_parse_as_unhandled() {
        let event: ModelEvent =
            serde_json::from_str(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert!(matches!(event, ModelEvent::Unhandled));
    }

    #[test]
    fn error_events_tolerate_sparse_payloads() {
        let event: ModelEvent = serde_json::from_str(
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad session"}}"#,
        )
        .unwrap();
        match event {
            ModelEvent::Error { error } => assert_eq!(error.message, "bad session"),
            other => panic!("unexpected event {other:?}"),
        }

        let event: ModelEvent = serde_json::from_str(r#"{"type":"error"}"#).unwrap();
        assert!(matches!(event, ModelEvent::Error { .. }));
    }
}
