//! The per-call bridge between the voice transport and the realtime model.
//!
//! One bridge runs per live call and is the only owner of that call's
//! [`InterviewMachine`]. All inbound streams (transport frames, model events,
//! review outcomes, operator commands) funnel into a single select loop, so
//! session state is mutated from exactly one place and never locked.
//!
//! Handlers on [`BridgeState`] are synchronous and return [`Effect`]s; the
//! loop interprets those against the sockets and registry. That split keeps
//! the interesting decisions testable without a live connection on either
//! side.

use crate::registry::{SessionCommand, SessionDigest};
use crate::state::AppState;
use crate::ws::model::{
    self, ClientEvent, ConversationItem, ModelEvent, ModelSink, ModelStream, OutputItem,
    SessionConfig,
};
use crate::ws::protocol::{ObserverMessage, TransportFrame, TransportReply};
use anyhow::{Result, bail};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use viva_core::machine::{Applied, InterviewMachine, SessionEvent};
use viva_core::senior::{PRIVATE_QUESTION_MARKER, ReviewRequest, SeniorVerdict};
use viva_core::tools::{self, ConsultSeniorArgs, RequestNextStageArgs};
use viva_core::transcript::Speaker;

/// The thinking beat between a committed stage decision and the next model
/// turn.
const RESUME_PAUSE: Duration = Duration::from_millis(1200);

/// How long to wait for the model to acknowledge session configuration
/// before abandoning the call.
const INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Seeded as the first user turn so the interviewer speaks first.
const OPENING_PROMPT: &str =
    "Hello! I am ready for the interview. Please introduce yourself and let's begin.";

/// What a handler wants done to the outside world, in order.
#[derive(Debug)]
enum Effect {
    Model(ClientEvent),
    Transport(TransportReply),
    SpawnReview { call_id: String, kind: ReviewKind },
    /// Refresh this session's registry digest.
    Digest,
    /// Refresh the digest and push a state snapshot to observers.
    Broadcast,
    Shutdown,
}

#[derive(Debug)]
enum ReviewKind {
    /// `request_next_stage`: the verdict is applied to the machine.
    Transition,
    /// `consult_senior`: critique only, session state untouched.
    Advisory { question: String },
}

/// What a spawned review task reports back into the select loop.
#[derive(Debug)]
enum ReviewOutcome {
    Transition { call_id: String, verdict: SeniorVerdict },
    Advisory { call_id: String, critique: String },
}

struct BridgeState {
    session_id: Uuid,
    stream_sid: String,
    voice: String,
    machine: InterviewMachine,
    /// At most one oversight analysis may be outstanding per session.
    oversight_in_flight: bool,
    /// When set, the loop owes the model a `response.create` at this instant.
    resume_deadline: Option<Instant>,
}

impl BridgeState {
    fn new(session_id: Uuid, stream_sid: String, voice: String) -> Self {
        Self {
            session_id,
            stream_sid,
            voice,
            machine: InterviewMachine::new(),
            oversight_in_flight: false,
            resume_deadline: None,
        }
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::for_interview(&self.voice, self.machine.instruction())
    }

    fn observer_snapshot(&self) -> ObserverMessage {
        ObserverMessage::StateUpdate {
            session_id: self.session_id,
            stage: self.machine.stage().label().to_string(),
            active_instruction: self.machine.instruction().to_string(),
            critique: self.machine.last_critique().map(str::to_string),
            instruction_history: self.machine.instruction_history().to_vec(),
            transcript: self.machine.transcript().turns().to_vec(),
            concluded: self.machine.is_concluded(),
        }
    }

    /// Effect for a freshly appended turn. Mid-interview the digest refresh
    /// is enough; observers pick the transcript up with the next stage
    /// snapshot. A concluded interview has no next snapshot, so its closing
    /// turns are pushed as they land.
    fn turn_effect(&self) -> Effect {
        if self.machine.is_concluded() {
            Effect::Broadcast
        } else {
            Effect::Digest
        }
    }

    fn on_transport_frame(&mut self, frame: TransportFrame) -> Vec<Effect> {
        match frame {
            TransportFrame::Start { start } => {
                debug!(stream_sid = %start.stream_sid, "stream re-announced");
                self.stream_sid = start.stream_sid;
                vec![]
            }
            TransportFrame::Media { media } => {
                vec![Effect::Model(ClientEvent::InputAudioAppend {
                    audio: media.payload,
                })]
            }
            TransportFrame::Stop => {
                info!("transport requested stop");
                vec![Effect::Shutdown]
            }
            TransportFrame::Ignored => vec![],
        }
    }

    fn on_model_event(&mut self, event: ModelEvent) -> Vec<Effect> {
        match event {
            ModelEvent::AudioDelta { delta } => {
                vec![Effect::Transport(TransportReply::media(
                    &self.stream_sid,
                    delta,
                ))]
            }
            ModelEvent::InputTranscriptionCompleted { transcript } => {
                info!(text = %transcript, "candidate turn transcribed");
                self.machine.apply(SessionEvent::Utterance {
                    speaker: Speaker::Candidate,
                    text: transcript,
                });
                vec![self.turn_effect()]
            }
            ModelEvent::ResponseTranscriptDone { transcript } => {
                info!(text = %transcript, "interviewer turn transcribed");
                self.machine.apply(SessionEvent::Utterance {
                    speaker: Speaker::Interviewer,
                    text: transcript,
                });
                vec![self.turn_effect()]
            }
            ModelEvent::ResponseDone { response } => {
                let mut effects = Vec::new();
                for item in response.output {
                    if let OutputItem::FunctionCall {
                        name,
                        call_id,
                        arguments,
                    } = item
                    {
                        effects.extend(self.on_tool_call(&name, &call_id, &arguments));
                    }
                }
                // With the interview concluded, the response that just
                // finished was the closing script; hang up after it. While a
                // review or the resume pause is pending the closing turn has
                // not been spoken yet.
                if self.machine.is_concluded()
                    && !self.oversight_in_flight
                    && self.resume_deadline.is_none()
                {
                    info!("closing turn delivered; ending session");
                    effects.push(Effect::Shutdown);
                }
                effects
            }
            ModelEvent::SessionCreated {} => {
                // the model may announce a fresh session mid-call; push the
                // current configuration again
                vec![Effect::Model(ClientEvent::SessionUpdate {
                    session: self.session_config(),
                })]
            }
            ModelEvent::SessionUpdated {} => {
                debug!("session configuration acknowledged");
                vec![]
            }
            ModelEvent::SpeechStarted {} => {
                debug!("candidate speech started");
                vec![]
            }
            ModelEvent::SpeechStopped {} => {
                debug!("candidate speech stopped");
                vec![]
            }
            ModelEvent::Error { error } => {
                warn!(message = %error.message, "model reported an error");
                vec![]
            }
            ModelEvent::Unhandled => vec![],
        }
    }

    fn on_tool_call(&mut self, name: &str, call_id: &str, arguments: &str) -> Vec<Effect> {
        match name {
            tools::REQUEST_NEXT_STAGE => {
                let reason = match serde_json::from_str::<RequestNextStageArgs>(arguments) {
                    Ok(args) => args.reason,
                    Err(e) => return self.reject_tool_call(call_id, format!("invalid arguments: {e}")),
                };
                if self.oversight_in_flight {
                    info!(%reason, "review already in flight; duplicate request dropped");
                    return self.busy_tool_call(call_id);
                }
                info!(stage = %self.machine.stage(), %reason, "stage transition requested");
                self.oversight_in_flight = true;
                vec![Effect::SpawnReview {
                    call_id: call_id.to_string(),
                    kind: ReviewKind::Transition,
                }]
            }
            tools::CONSULT_SENIOR => {
                let question = match serde_json::from_str::<ConsultSeniorArgs>(arguments) {
                    Ok(args) => args.question,
                    Err(e) => return self.reject_tool_call(call_id, format!("invalid arguments: {e}")),
                };
                if self.oversight_in_flight {
                    info!("review already in flight; consultation dropped");
                    return self.busy_tool_call(call_id);
                }
                info!(stage = %self.machine.stage(), "private consultation requested");
                self.oversight_in_flight = true;
                vec![Effect::SpawnReview {
                    call_id: call_id.to_string(),
                    kind: ReviewKind::Advisory { question },
                }]
            }
            unknown => {
                warn!(capability = unknown, "model requested an unknown capability");
                self.reject_tool_call(call_id, format!("unknown capability: {unknown}"))
            }
        }
    }

    /// Applies a transition verdict and schedules the delayed resume.
    fn on_transition_verdict(&mut self, call_id: &str, verdict: SeniorVerdict) -> Vec<Effect> {
        self.oversight_in_flight = false;
        let instruction_before = self.machine.instruction().to_string();
        let applied = self.machine.apply(SessionEvent::Oversight(verdict));

        let ack = match &applied {
            Applied::StageChanged { to, .. } => json!({"status": "advanced", "stage": to.label()}),
            Applied::Concluded { stage } => json!({"status": "concluded", "stage": stage.label()}),
            Applied::InstructionRefreshed { stage } => {
                json!({"status": "remained", "stage": stage.label()})
            }
            Applied::Unchanged => {
                json!({"status": "remained", "stage": self.machine.stage().label()})
            }
        };

        let mut effects = vec![Effect::Model(tool_output(call_id, ack.to_string()))];
        if self.machine.instruction() != instruction_before {
            effects.push(Effect::Model(ClientEvent::SessionUpdate {
                session: self.session_config(),
            }));
        }
        if applied != Applied::Unchanged {
            effects.push(Effect::Broadcast);
        }
        self.resume_deadline = Some(Instant::now() + RESUME_PAUSE);
        effects
    }

    /// Returns a consultation's critique to the model. Nothing else moves:
    /// no stage, no instruction, no pause.
    fn on_advisory_critique(&mut self, call_id: &str, critique: String) -> Vec<Effect> {
        self.oversight_in_flight = false;
        vec![
            Effect::Model(tool_output(call_id, critique)),
            Effect::Model(ClientEvent::ResponseCreate {}),
        ]
    }

    fn on_command(&mut self, command: SessionCommand) -> Vec<Effect> {
        match command {
            SessionCommand::ForceAdvance => {
                info!(stage = %self.machine.stage(), "operator forced a stage advance");
                let applied = self.machine.apply(SessionEvent::ForceAdvance);
                if applied == Applied::Unchanged {
                    return vec![];
                }
                self.resume_deadline = Some(Instant::now() + RESUME_PAUSE);
                vec![
                    Effect::Model(ClientEvent::SessionUpdate {
                        session: self.session_config(),
                    }),
                    Effect::Broadcast,
                ]
            }
        }
    }

    fn busy_tool_call(&self, call_id: &str) -> Vec<Effect> {
        vec![
            Effect::Model(tool_output(
                call_id,
                json!({"status": "analysis already in progress"}).to_string(),
            )),
            Effect::Model(ClientEvent::ResponseCreate {}),
        ]
    }

    fn reject_tool_call(&self, call_id: &str, message: String) -> Vec<Effect> {
        vec![
            Effect::Model(tool_output(call_id, json!({"error": message}).to_string())),
            Effect::Model(ClientEvent::ResponseCreate {}),
        ]
    }
}

fn tool_output(call_id: &str, output: String) -> ClientEvent {
    ClientEvent::ConversationItemCreate {
        item: ConversationItem::tool_output(call_id, output),
    }
}

/// Runs one call end to end: model connect and configure, then the event
/// loop until either side hangs up or the interview concludes.
pub async fn run(
    state: Arc<AppState>,
    socket: WebSocket,
    session_id: Uuid,
    stream_sid: String,
    mut command_rx: mpsc::Receiver<SessionCommand>,
) -> Result<()> {
    let (mut transport_tx, mut transport_rx) = socket.split();
    let (mut model_tx, mut model_rx) = model::connect(&state.config).await?;

    let mut bridge = BridgeState::new(session_id, stream_sid, state.config.voice.clone());
    initialize_model_session(&bridge, &mut model_tx, &mut model_rx).await?;

    let (outcome_tx, mut outcome_rx) = mpsc::channel::<ReviewOutcome>(1);

    loop {
        tokio::select! {
            frame = transport_rx.next() => {
                let effects = match frame {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<TransportFrame>(&text) {
                        Ok(frame) => bridge.on_transport_frame(frame),
                        Err(e) => {
                            warn!(error = %e, "unparseable transport frame");
                            vec![Effect::Transport(TransportReply::Error {
                                message: format!("unparseable frame: {e}"),
                            })]
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("transport connection closed");
                        break;
                    }
                    Some(Ok(_)) => vec![],
                    Some(Err(e)) => {
                        warn!(error = %e, "transport connection failed");
                        break;
                    }
                };
                if apply_effects(effects, &bridge, &state, &mut transport_tx, &mut model_tx, &outcome_tx).await? {
                    break;
                }
            }
            event = model_rx.next() => {
                let effects = match event {
                    Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<ModelEvent>(&text) {
                        Ok(event) => bridge.on_model_event(event),
                        Err(e) => {
                            warn!(error = %e, "unparseable model event");
                            vec![]
                        }
                    },
                    Some(Ok(WsMessage::Close(_))) | None => {
                        warn!("model connection closed");
                        break;
                    }
                    Some(Ok(_)) => vec![],
                    Some(Err(e)) => {
                        warn!(error = %e, "model connection failed");
                        break;
                    }
                };
                if apply_effects(effects, &bridge, &state, &mut transport_tx, &mut model_tx, &outcome_tx).await? {
                    break;
                }
            }
            Some(outcome) = outcome_rx.recv() => {
                let effects = match outcome {
                    ReviewOutcome::Transition { call_id, verdict } => {
                        bridge.on_transition_verdict(&call_id, verdict)
                    }
                    ReviewOutcome::Advisory { call_id, critique } => {
                        bridge.on_advisory_critique(&call_id, critique)
                    }
                };
                if apply_effects(effects, &bridge, &state, &mut transport_tx, &mut model_tx, &outcome_tx).await? {
                    break;
                }
            }
            Some(command) = command_rx.recv() => {
                let effects = bridge.on_command(command);
                if apply_effects(effects, &bridge, &state, &mut transport_tx, &mut model_tx, &outcome_tx).await? {
                    break;
                }
            }
            _ = resume_pause(bridge.resume_deadline) => {
                bridge.resume_deadline = None;
                model::send_event(&mut model_tx, &ClientEvent::ResponseCreate {}).await?;
            }
        }
    }

    info!("bridge loop finished");
    Ok(())
}

/// Pushes the session configuration and waits for the model to confirm it,
/// then seeds the opening exchange. A session that cannot configure itself
/// is abandoned, not retried.
async fn initialize_model_session(
    bridge: &BridgeState,
    model_tx: &mut ModelSink,
    model_rx: &mut ModelStream,
) -> Result<()> {
    model::send_event(
        model_tx,
        &ClientEvent::SessionUpdate {
            session: bridge.session_config(),
        },
    )
    .await?;

    let confirmed = tokio::time::timeout(INIT_TIMEOUT, async {
        while let Some(message) = model_rx.next().await {
            let WsMessage::Text(text) = message? else {
                continue;
            };
            match serde_json::from_str::<ModelEvent>(&text) {
                Ok(ModelEvent::SessionCreated {}) => {
                    model::send_event(
                        model_tx,
                        &ClientEvent::SessionUpdate {
                            session: bridge.session_config(),
                        },
                    )
                    .await?;
                }
                Ok(ModelEvent::SessionUpdated {}) => return Ok(()),
                Ok(ModelEvent::Error { error }) => {
                    bail!("model rejected session configuration: {}", error.message)
                }
                _ => {}
            }
        }
        bail!("model connection closed during initialization")
    })
    .await;

    match confirmed {
        Ok(result) => result?,
        Err(_) => bail!("model did not confirm session configuration within {INIT_TIMEOUT:?}"),
    }

    info!("session configured; requesting the opening turn");
    model::send_event(
        model_tx,
        &ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(OPENING_PROMPT),
        },
    )
    .await?;
    model::send_event(model_tx, &ClientEvent::ResponseCreate {}).await?;
    Ok(())
}

/// Interprets a handler's effects. Returns true when the session should end.
async fn apply_effects(
    effects: Vec<Effect>,
    bridge: &BridgeState,
    state: &Arc<AppState>,
    transport_tx: &mut SplitSink<WebSocket, Message>,
    model_tx: &mut ModelSink,
    outcome_tx: &mpsc::Sender<ReviewOutcome>,
) -> Result<bool> {
    for effect in effects {
        match effect {
            Effect::Model(event) => model::send_event(model_tx, &event).await?,
            Effect::Transport(reply) => {
                let serialized = serde_json::to_string(&reply)?;
                transport_tx.send(Message::Text(serialized.into())).await?;
            }
            Effect::SpawnReview { call_id, kind } => {
                spawn_review(bridge, state, outcome_tx.clone(), call_id, kind)
            }
            Effect::Digest => state
                .registry
                .update(bridge.session_id, SessionDigest::from(&bridge.machine)),
            Effect::Broadcast => {
                state
                    .registry
                    .update(bridge.session_id, SessionDigest::from(&bridge.machine));
                state.registry.broadcast(bridge.observer_snapshot());
            }
            Effect::Shutdown => return Ok(true),
        }
    }
    Ok(false)
}

/// Runs the senior review off the select loop so audio keeps flowing while
/// the analysis is outstanding. The task owns a transcript snapshot taken at
/// request time.
fn spawn_review(
    bridge: &BridgeState,
    state: &Arc<AppState>,
    outcome_tx: mpsc::Sender<ReviewOutcome>,
    call_id: String,
    kind: ReviewKind,
) {
    let senior = Arc::clone(&state.senior);
    let stage = bridge.machine.stage();
    let mut transcript = bridge.machine.transcript().clone();
    let span = info_span!("oversight", %stage);

    tokio::spawn(
        async move {
            let outcome = match kind {
                ReviewKind::Transition => {
                    let verdict = senior
                        .analyze(&ReviewRequest::for_stage(stage, &transcript))
                        .await;
                    ReviewOutcome::Transition { call_id, verdict }
                }
                ReviewKind::Advisory { question } => {
                    transcript.push(
                        Speaker::Interviewer,
                        format!("{PRIVATE_QUESTION_MARKER}: {question}"),
                    );
                    let verdict = senior
                        .analyze(&ReviewRequest::for_stage(stage, &transcript))
                        .await;
                    ReviewOutcome::Advisory {
                        call_id,
                        critique: verdict.critique,
                    }
                }
            };
            if outcome_tx.send(outcome).await.is_err() {
                debug!("session ended before the review outcome was delivered");
            }
        }
        .instrument(span),
    );
}

/// Select-arm future for the delayed resume. With no deadline armed the arm
/// simply never completes.
async fn resume_pause(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::model::ResponseSummary;
    use crate::ws::protocol::MediaPayload;
    use viva_core::senior::Disposition;
    use viva_core::stage::Stage;

    fn bridge() -> BridgeState {
        BridgeState::new(Uuid::new_v4(), "MZ_test".to_string(), "alloy".to_string())
    }

    fn advance_verdict(instruction: &str) -> SeniorVerdict {
        SeniorVerdict {
            critique: "goals met".to_string(),
            instruction: Some(instruction.to_string()),
            disposition: Disposition::Advance,
        }
    }

    fn tool_outputs(effects: &[Effect]) -> Vec<(String, String)> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Model(ClientEvent::ConversationItemCreate {
                    item: ConversationItem::FunctionCallOutput { call_id, output },
                }) => Some((call_id.clone(), output.clone())),
                _ => None,
            })
            .collect()
    }

    fn pushed_instructions(effects: &[Effect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Model(ClientEvent::SessionUpdate { session }) => {
                    Some(session.instructions.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn requests_response(effects: &[Effect]) -> bool {
        effects
            .iter()
            .any(|effect| matches!(effect, Effect::Model(ClientEvent::ResponseCreate {})))
    }

    fn spawns_review(effects: &[Effect]) -> bool {
        effects
            .iter()
            .any(|effect| matches!(effect, Effect::SpawnReview { .. }))
    }

    fn broadcasts(effects: &[Effect]) -> bool {
        effects.iter().any(|effect| matches!(effect, Effect::Broadcast))
    }

    #[test]
    fn caller_audio_relays_to_the_model_verbatim() {
        let mut bridge = bridge();
        let effects = bridge.on_transport_frame(TransportFrame::Media {
            media: MediaPayload {
                payload: "AAAA".to_string(),
            },
        });
        assert!(matches!(
            &effects[..],
            [Effect::Model(ClientEvent::InputAudioAppend { audio })] if audio == "AAAA"
        ));
    }

    #[test]
    fn model_audio_is_addressed_to_the_captured_stream() {
        let mut bridge = bridge();
        let effects = bridge.on_model_event(ModelEvent::AudioDelta {
            delta: "b64audio".to_string(),
        });
        match &effects[..] {
            [Effect::Transport(TransportReply::Media { stream_sid, media })] => {
                assert_eq!(stream_sid, "MZ_test");
                assert_eq!(media.payload, "b64audio");
            }
            other => panic!("unexpected effects {other:?}"),
        }
    }

    #[test]
    fn stop_frame_requests_shutdown() {
        let mut bridge = bridge();
        let effects = bridge.on_transport_frame(TransportFrame::Stop);
        assert!(matches!(&effects[..], [Effect::Shutdown]));
    }

    #[test]
    fn finished_turns_append_to_the_transcript_in_arrival_order() {
        let mut bridge = bridge();
        bridge.on_model_event(ModelEvent::ResponseTranscriptDone {
            transcript: "Welcome in!".to_string(),
        });
        bridge.on_model_event(ModelEvent::InputTranscriptionCompleted {
            transcript: "Thanks, I'm Sam.".to_string(),
        });

        assert_eq!(
            bridge.machine.transcript().render(),
            "interviewer: Welcome in!\ncandidate: Thanks, I'm Sam."
        );
    }

    #[test]
    fn function_calls_inside_a_finished_response_are_dispatched() {
        let mut bridge = bridge();
        let effects = bridge.on_model_event(ModelEvent::ResponseDone {
            response: ResponseSummary {
                output: vec![
                    OutputItem::Other,
                    OutputItem::FunctionCall {
                        name: tools::REQUEST_NEXT_STAGE.to_string(),
                        call_id: "call_1".to_string(),
                        arguments: r#"{"reason":"intro done"}"#.to_string(),
                    },
                ],
            },
        });
        assert!(spawns_review(&effects));
        assert!(bridge.oversight_in_flight);
    }

    #[test]
    fn duplicate_transition_requests_produce_one_advance() {
        let mut bridge = bridge();
        let first = bridge.on_tool_call(
            tools::REQUEST_NEXT_STAGE,
            "call_1",
            r#"{"reason":"intro done"}"#,
        );
        assert!(spawns_review(&first));

        let second = bridge.on_tool_call(
            tools::REQUEST_NEXT_STAGE,
            "call_2",
            r#"{"reason":"still done"}"#,
        );
        assert!(!spawns_review(&second));
        let outputs = tool_outputs(&second);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, "call_2");
        assert!(outputs[0].1.contains("analysis already in progress"));
        assert!(requests_response(&second));

        bridge.on_transition_verdict("call_1", advance_verdict("Bridge and ask about the role."));
        assert_eq!(bridge.machine.stage(), Stage::Screening);
    }

    #[test]
    fn unknown_capability_is_rejected_without_mutation() {
        let mut bridge = bridge();
        let history_before = bridge.machine.instruction_history().len();
        let effects = bridge.on_tool_call("teleport_candidate", "call_9", "{}");

        let outputs = tool_outputs(&effects);
        assert!(outputs[0].1.contains("unknown capability: teleport_candidate"));
        assert!(requests_response(&effects));
        assert!(!spawns_review(&effects));
        assert!(!bridge.oversight_in_flight);
        assert_eq!(bridge.machine.stage(), Stage::Welcome);
        assert_eq!(bridge.machine.instruction_history().len(), history_before);
    }

    #[test]
    fn malformed_tool_arguments_are_rejected_explicitly() {
        let mut bridge = bridge();
        let effects = bridge.on_tool_call(tools::REQUEST_NEXT_STAGE, "call_3", "not json");

        let outputs = tool_outputs(&effects);
        assert!(outputs[0].1.contains("invalid arguments"));
        assert!(!bridge.oversight_in_flight);
        assert!(!spawns_review(&effects));
    }

    #[test]
    fn an_advance_verdict_reloads_the_session_and_schedules_the_resume() {
        let mut bridge = bridge();
        bridge.on_tool_call(
            tools::REQUEST_NEXT_STAGE,
            "call_1",
            r#"{"reason":"intro done"}"#,
        );
        let effects = bridge
            .on_transition_verdict("call_1", advance_verdict("Nice intro. Now, your current role."));

        assert_eq!(bridge.machine.stage(), Stage::Screening);
        let outputs = tool_outputs(&effects);
        assert!(outputs[0].1.contains("advanced"));
        assert!(outputs[0].1.contains("SCREENING"));
        assert_eq!(
            pushed_instructions(&effects),
            ["Nice intro. Now, your current role."]
        );
        assert!(broadcasts(&effects));
        assert!(bridge.resume_deadline.is_some());
        assert!(!bridge.oversight_in_flight);
    }

    #[test]
    fn a_failed_review_keeps_the_instruction_and_stage() {
        let mut bridge = bridge();
        bridge.on_tool_call(tools::REQUEST_NEXT_STAGE, "call_1", r#"{"reason":"done"}"#);
        let effects = bridge.on_transition_verdict(
            "call_1",
            SeniorVerdict::remain("oversight call failed: upstream 500"),
        );

        assert_eq!(bridge.machine.stage(), Stage::Welcome);
        assert_eq!(bridge.machine.instruction(), Stage::Welcome.template());
        assert!(tool_outputs(&effects)[0].1.contains("remained"));
        assert!(pushed_instructions(&effects).is_empty());
        assert!(!broadcasts(&effects));
    }

    #[test]
    fn a_transition_request_at_the_terminal_stage_acks_remained() {
        let mut bridge = bridge();
        for call in ["c1", "c2", "c3", "c4", "c5"] {
            bridge.on_tool_call(tools::REQUEST_NEXT_STAGE, call, r#"{"reason":"done"}"#);
            bridge.on_transition_verdict(call, advance_verdict("next stage brief"));
        }
        assert_eq!(bridge.machine.stage(), Stage::Feedback);

        bridge.on_tool_call(tools::REQUEST_NEXT_STAGE, "c6", r#"{"reason":"done"}"#);
        let effects = bridge.on_transition_verdict("c6", advance_verdict("past the end"));

        assert_eq!(bridge.machine.stage(), Stage::Feedback);
        let outputs = tool_outputs(&effects);
        assert!(outputs[0].1.contains("remained"));
        assert!(outputs[0].1.contains("FEEDBACK"));
        assert!(pushed_instructions(&effects).is_empty());
    }

    #[test]
    fn consultation_returns_critique_text_without_touching_state() {
        let mut bridge = bridge();
        let effects = bridge.on_tool_call(
            tools::CONSULT_SENIOR,
            "call_4",
            r#"{"question":"They asked about pay."}"#,
        );
        match &effects[..] {
            [Effect::SpawnReview {
                kind: ReviewKind::Advisory { question },
                ..
            }] => assert_eq!(question, "They asked about pay."),
            other => panic!("unexpected effects {other:?}"),
        }

        let history_before = bridge.machine.instruction_history().len();
        let effects =
            bridge.on_advisory_critique("call_4", "Deflect politely; pay is HR's lane.".to_string());

        let outputs = tool_outputs(&effects);
        assert_eq!(outputs[0].1, "Deflect politely; pay is HR's lane.");
        assert!(requests_response(&effects));
        assert_eq!(bridge.machine.stage(), Stage::Welcome);
        assert_eq!(bridge.machine.instruction_history().len(), history_before);
        assert_eq!(bridge.machine.last_critique(), None);
        assert!(bridge.resume_deadline.is_none());
        assert!(!bridge.oversight_in_flight);
    }

    #[test]
    fn shutdown_waits_for_the_closing_turn_to_finish() {
        let mut bridge = bridge();
        bridge.on_tool_call(tools::REQUEST_NEXT_STAGE, "c1", r#"{"reason":"wrap"}"#);
        bridge.on_transition_verdict(
            "c1",
            SeniorVerdict {
                critique: "wrap it".to_string(),
                instruction: Some("Thank them and close.".to_string()),
                disposition: Disposition::Terminate,
            },
        );
        assert!(bridge.machine.is_concluded());

        // resume still pending, so the response that just finished predates
        // the closing script
        let effects = bridge.on_model_event(ModelEvent::ResponseDone {
            response: ResponseSummary::default(),
        });
        assert!(!effects.iter().any(|e| matches!(e, Effect::Shutdown)));

        bridge.resume_deadline = None;
        let turns_before = bridge.machine.transcript().len();
        let effects = bridge.on_model_event(ModelEvent::ResponseTranscriptDone {
            transcript: "Thank you for your time today. Goodbye!".to_string(),
        });
        // the closing turn lands in the record and reaches observers
        assert_eq!(bridge.machine.transcript().len(), turns_before + 1);
        assert!(broadcasts(&effects));

        let effects = bridge.on_model_event(ModelEvent::ResponseDone {
            response: ResponseSummary::default(),
        });
        assert!(effects.iter().any(|e| matches!(e, Effect::Shutdown)));
    }

    #[test]
    fn operator_force_advance_steps_one_stage_and_reloads() {
        let mut bridge = bridge();
        let effects = bridge.on_command(SessionCommand::ForceAdvance);

        assert_eq!(bridge.machine.stage(), Stage::Screening);
        assert_eq!(
            pushed_instructions(&effects),
            [Stage::Screening.template().to_string()]
        );
        assert!(broadcasts(&effects));
        assert!(bridge.resume_deadline.is_some());

        for _ in 0..4 {
            bridge.on_command(SessionCommand::ForceAdvance);
        }
        assert_eq!(bridge.machine.stage(), Stage::Feedback);
        assert!(bridge.on_command(SessionCommand::ForceAdvance).is_empty());
    }

    #[test]
    fn observer_snapshots_carry_the_full_session_state() {
        let mut bridge = bridge();
        bridge.on_model_event(ModelEvent::ResponseTranscriptDone {
            transcript: "Hello Sam.".to_string(),
        });
        bridge.on_tool_call(tools::REQUEST_NEXT_STAGE, "c1", r#"{"reason":"done"}"#);
        bridge.on_transition_verdict("c1", advance_verdict("On to screening."));

        let ObserverMessage::StateUpdate {
            session_id,
            stage,
            active_instruction,
            critique,
            instruction_history,
            transcript,
            concluded,
        } = bridge.observer_snapshot();

        assert_eq!(session_id, bridge.session_id);
        assert_eq!(stage, "SCREENING");
        assert_eq!(active_instruction, "On to screening.");
        assert_eq!(critique.as_deref(), Some("goals met"));
        assert_eq!(instruction_history.len(), 2);
        assert_eq!(transcript.len(), 1);
        assert!(!concluded);
    }
}
