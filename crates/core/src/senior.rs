//! The senior oversight role.
//!
//! The senior never speaks to the candidate. It reviews the transcript when
//! the junior requests a stage transition, decides whether the stage's goals
//! are met, and rewrites the junior's entire operating instruction for the
//! turn that follows. Its verdict is the only message in the system that can
//! move the interview forward.

use crate::llm::{ChatClient, CompletionRequest};
use crate::stage::Stage;
use crate::transcript::Transcript;
use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// Sampling temperature for oversight calls. Verdicts gate irreversible
/// stage advances, so they run much colder than the front agent.
const SENIOR_TEMPERATURE: f32 = 0.1;

const SENIOR_SYSTEM_PROMPT: &str = r#"You are the senior interviewer overseeing a live, staged voice interview.
A junior persona carries the conversation; you are consulted when it believes
the current stage is complete, and your verdict is the only thing that can
move the interview forward.

Given the current stage, its template, the full stage map, and the transcript
so far, decide whether the stage's goals are satisfied.

Rules:
1. Summarize what the stage just covered in one or two sentences; fold that
   summary into any {{...}} placeholder the next template declares.
2. When you advance, your "instruction" must be the COMPLETE replacement
   prompt for the next stage, and it MUST open with a bridge: acknowledge the
   subject just finished, close it, then pivot to the next goal.
3. When the stage's goals are not met, keep the interview where it is and, if
   useful, issue a refined instruction for the current stage instead.
4. Prune goals from earlier stages; the junior follows only your latest
   instruction.
5. If the candidate's last turn is only a filler like "all right", they are
   about to keep talking. Do not advance over them.
6. A line marked [PRIVATE QUESTION TO SENIOR] was never heard by the
   candidate. Answer it in your critique and do not advance the stage for it.

Respond with JSON only:
{
  "critique": "internal notes for the logs, never read aloud",
  "instruction": "the exact replacement prompt for the junior, or null",
  "disposition": "remain" | "advance" | "terminate"
}"#;

/// The oversight verdict on the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    /// Keep the interview in its current stage.
    #[default]
    Remain,
    /// Move to the declared successor stage.
    Advance,
    /// End the interview after the closing turn.
    Terminate,
}

impl Disposition {
    /// Maps a wire disposition string onto the fixed vocabulary.
    ///
    /// Anything outside the vocabulary resolves to `Remain`: an unrecognized
    /// verdict must never be read as a stage jump.
    pub fn parse(raw: &str) -> Disposition {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADVANCE" => Disposition::Advance,
            "TERMINATE" => Disposition::Terminate,
            _ => Disposition::Remain,
        }
    }
}

/// One oversight decision: internal critique, optional full replacement
/// instruction for the junior, and the disposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeniorVerdict {
    pub critique: String,
    pub instruction: Option<String>,
    pub disposition: Disposition,
}

#[derive(Deserialize)]
struct RawVerdict {
    #[serde(default)]
    critique: String,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default)]
    disposition: String,
}

impl SeniorVerdict {
    /// The fail-safe verdict: stay put, keep the last known-good instruction.
    pub fn remain(critique: impl Into<String>) -> Self {
        Self {
            critique: critique.into(),
            instruction: None,
            disposition: Disposition::Remain,
        }
    }

    /// Parses an oversight response payload.
    ///
    /// Blank instructions are normalized to `None` so a verdict can never
    /// blank out the active instruction.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        let raw: RawVerdict = serde_json::from_str(payload)?;
        Ok(Self {
            critique: raw.critique,
            instruction: raw.instruction.filter(|text| !text.trim().is_empty()),
            disposition: Disposition::parse(&raw.disposition),
        })
    }
}

/// Marks a transcript line the candidate never heard: a mid-stage question
/// from the junior, carried to the senior as a synthetic turn.
pub const PRIVATE_QUESTION_MARKER: &str = "[PRIVATE QUESTION TO SENIOR]";

/// The analysis request: the stage under review plus everything the senior
/// needs to compose a successor instruction.
pub struct ReviewRequest<'a> {
    pub stage: Stage,
    pub template: &'a str,
    pub stage_graph: serde_json::Value,
    pub transcript: &'a Transcript,
}

impl<'a> ReviewRequest<'a> {
    /// Builds the standard review of `stage` against `transcript`.
    pub fn for_stage(stage: Stage, transcript: &'a Transcript) -> Self {
        Self {
            stage,
            template: stage.template(),
            stage_graph: Stage::graph_json(),
            transcript,
        }
    }
}

/// The oversight role itself, bound to a chat client.
pub struct SeniorAgent {
    chat: Arc<dyn ChatClient>,
}

impl SeniorAgent {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    /// Reviews the transcript and produces a verdict.
    ///
    /// This call is total: any transport error, non-JSON payload, or
    /// unparseable structure collapses to a `Remain` verdict so an oversight
    /// outage can never crash a live call or skip a stage.
    pub async fn analyze(&self, request: &ReviewRequest<'_>) -> SeniorVerdict {
        let messages = match build_review_messages(request) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = ?e, "failed to assemble oversight prompt");
                return SeniorVerdict::remain(format!("oversight prompt assembly failed: {e:#}"));
            }
        };

        let payload = match self
            .chat
            .complete(CompletionRequest {
                messages,
                temperature: SENIOR_TEMPERATURE,
                json_object: true,
            })
            .await
        {
            Ok(payload) => payload,
            Err(e) => {
                warn!(stage = %request.stage, error = ?e, "oversight call failed; remaining in stage");
                return SeniorVerdict::remain(format!("oversight call failed: {e:#}"));
            }
        };

        match SeniorVerdict::parse(&payload) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(stage = %request.stage, error = %e, "unparseable oversight response; remaining in stage");
                SeniorVerdict::remain(format!("unparseable oversight response: {e}"))
            }
        }
    }
}

fn build_review_messages(
    request: &ReviewRequest<'_>,
) -> Result<Vec<async_openai::types::ChatCompletionRequestMessage>> {
    let user_message = format!(
        "Current stage: {}\nStage template:\n{}\n\nAll interview stages:\n{}\n\nTranscript:\n{}",
        request.stage,
        request.template,
        serde_json::to_string_pretty(&request.stage_graph)?,
        request.transcript.render(),
    );
    Ok(vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(SENIOR_SYSTEM_PROMPT)
            .build()?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?
            .into(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Speaker;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A chat client that replays a fixed script of outcomes.
    struct ScriptedChat {
        replies: Mutex<VecDeque<Result<String>>>,
    }

    impl ScriptedChat {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedChat {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }
    }

    fn transcript_with_intro() -> Transcript {
        let mut transcript = Transcript::new();
        transcript.push(Speaker::Interviewer, "Welcome! Tell me about yourself.");
        transcript.push(Speaker::Candidate, "I'm Sam, a platform engineer.");
        transcript
    }

    #[tokio::test]
    async fn maps_a_well_formed_advance_verdict() {
        let chat = ScriptedChat::new(vec![Ok(r#"{
            "critique": "Intro was complete and specific.",
            "instruction": "That's a clear introduction, Sam. Now let's talk about your current role.",
            "disposition": "advance"
        }"#
        .to_string())]);
        let senior = SeniorAgent::new(chat);
        let transcript = transcript_with_intro();

        let verdict = senior
            .analyze(&ReviewRequest::for_stage(Stage::Welcome, &transcript))
            .await;

        assert_eq!(verdict.disposition, Disposition::Advance);
        assert_eq!(verdict.critique, "Intro was complete and specific.");
        assert!(verdict.instruction.unwrap().starts_with("That's a clear"));
    }

    #[tokio::test]
    async fn chat_failure_collapses_to_remain() {
        let chat = ScriptedChat::new(vec![Err(anyhow!("upstream 500"))]);
        let senior = SeniorAgent::new(chat);
        let transcript = transcript_with_intro();

        let verdict = senior
            .analyze(&ReviewRequest::for_stage(Stage::Screening, &transcript))
            .await;

        assert_eq!(verdict.disposition, Disposition::Remain);
        assert_eq!(verdict.instruction, None);
        assert!(verdict.critique.contains("oversight call failed"));
    }

    #[tokio::test]
    async fn non_json_payload_collapses_to_remain() {
        let chat = ScriptedChat::new(vec![Ok("Sounds good, moving on!".to_string())]);
        let senior = SeniorAgent::new(chat);
        let transcript = transcript_with_intro();

        let verdict = senior
            .analyze(&ReviewRequest::for_stage(Stage::Welcome, &transcript))
            .await;

        assert_eq!(verdict.disposition, Disposition::Remain);
        assert_eq!(verdict.instruction, None);
    }

    #[test]
    fn unknown_disposition_strings_parse_as_remain() {
        assert_eq!(Disposition::parse("advance"), Disposition::Advance);
        assert_eq!(Disposition::parse("TERMINATE"), Disposition::Terminate);
        assert_eq!(Disposition::parse("remain"), Disposition::Remain);
        assert_eq!(Disposition::parse("continue"), Disposition::Remain);
        assert_eq!(Disposition::parse("SKIP_TO_FEEDBACK"), Disposition::Remain);
        assert_eq!(Disposition::parse(""), Disposition::Remain);
    }

    #[test]
    fn blank_instruction_normalizes_to_none() {
        let verdict =
            SeniorVerdict::parse(r#"{"critique":"thin","instruction":"  ","disposition":"remain"}"#)
                .unwrap();
        assert_eq!(verdict.instruction, None);

        let verdict =
            SeniorVerdict::parse(r#"{"critique":"","disposition":"advance"}"#).unwrap();
        assert_eq!(verdict.instruction, None);
        assert_eq!(verdict.disposition, Disposition::Advance);
    }

    #[test]
    fn review_prompt_carries_stage_graph_and_transcript() {
        let transcript = transcript_with_intro();
        let request = ReviewRequest::for_stage(Stage::Welcome, &transcript);
        let messages = build_review_messages(&request).unwrap();

        let rendered = serde_json::to_string(&messages).unwrap();
        assert!(rendered.contains("Current stage: WELCOME"));
        assert!(rendered.contains("TECHNICAL_PROBE"));
        assert!(rendered.contains("I'm Sam, a platform engineer."));
    }

    #[test]
    fn a_private_question_rides_the_transcript_into_the_prompt() {
        let mut transcript = transcript_with_intro();
        transcript.push(
            Speaker::Interviewer,
            format!("{PRIVATE_QUESTION_MARKER}: The candidate asked about salary. How should I respond?"),
        );
        let request = ReviewRequest::for_stage(Stage::Screening, &transcript);
        let messages = build_review_messages(&request).unwrap();

        let rendered = serde_json::to_string(&messages).unwrap();
        assert!(rendered.contains("PRIVATE QUESTION TO SENIOR"));
        assert!(rendered.contains("The candidate asked about salary."));
    }
}
