//! The fixed interview stage graph.
//!
//! Stages are defined once at compile time and never mutated per session.
//! The graph is a straight line: every stage names exactly one successor and
//! the final stage has none. Template text is pure data; the oversight agent
//! is responsible for resolving the `{{...}}` placeholders when it composes
//! a live instruction from a template.

use serde::{Deserialize, Serialize};
use std::fmt;

const WELCOME_TEMPLATE: &str = r#"You are June, an AI recruiter with Meridian Labs. You are interviewing a candidate for the Solutions Engineer role.

Your Goal:
Greet the candidate briefly and name the role.
Ask them to introduce themselves.

STOP CONDITION (call request_next_stage):
Call the tool once the candidate has given their name and a reasonable introduction.

Style: Warm and upbeat but concise. Do not troubleshoot audio problems. Keep each turn under ten seconds."#;

const SCREENING_TEMPLATE: &str = r#"The candidate introduced themselves as: {{SENIOR_SUMMARY_OF_INTRO}}.

Your Goal: Understand their current position and recent work.
Action: Ask one or two pointed questions about their day-to-day responsibilities, grounded in the summary above.

STOP CONDITION (call request_next_stage):
Call the tool once you understand their current responsibilities and impact.

Style: Professional and curious. No small talk."#;

const TECHNICAL_PROBE_TEMPLATE: &str = r#"Your Goal: Probe the candidate's grasp of applied AI fundamentals.
Action: Ask them to explain ONE of the following and how they have used it (or would use it):
- Realtime voice models
- Retrieval-augmented generation
- Vector embeddings
- Conversation state machines

Constraint: Pick whichever fits their background best; default to retrieval-augmented generation when unsure. Keep the question simple.

STOP CONDITION (call request_next_stage):
Call the tool once they have given a substantive technical explanation."#;

const DEEP_DIVE_TEMPLATE: &str = r#"Your Goal: Assess system design under realistic constraints.

The Scenario: 'We need a customer-facing voice agent that fronts a legacy ticketing system. It needs retrieval over the knowledge base and a state machine for the conversation flow.'

Action: Ask the candidate to sketch the end-to-end architecture.
Focus: Push on the integration with the legacy system, data freshness, and where conversation state lives.

Style: Challenging. When an answer is vague, ask for specifics.

STOP CONDITION (call request_next_stage):
Call the tool once they have outlined a workable architecture and survived a follow-up or two."#;

const JOB_PITCH_TEMPLATE: &str = r#"Your Goal: Pitch the Solutions Engineer role at Meridian Labs.

Key points to cover:
- High-ownership role embedding our voice agents into customer operations.
- Regular on-site time with customers, most weeks.
- Equal parts engineering and in-the-field problem solving.

Style: Enthusiastic and honest about the demands.

STOP CONDITION (call request_next_stage):
Call the tool once you have pitched the role and fielded any quick questions."#;

const FEEDBACK_TEMPLATE: &str = r#"Your Goal: Deliver immediate, unvarnished feedback based on this performance data: {{SENIOR_PERFORMANCE_SCORECARD}}.

Instructions:
- Summarize strengths in a sentence or two.
- Be direct about weaknesses. If an explanation was shallow, say so. If they rambled, say so.
- Close with 'Thank you for your time.'

Style: Direct, neutral, professional.

STOP CONDITION (call request_next_stage):
Call the tool once the feedback is delivered and you have thanked them."#;

/// One phase of the interview script.
///
/// Variants are declared in interview order; `next` walks that order and
/// `Feedback` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Welcome,
    Screening,
    TechnicalProbe,
    DeepDive,
    JobPitch,
    Feedback,
}

impl Stage {
    /// Every stage, in interview order.
    pub const ALL: [Stage; 6] = [
        Stage::Welcome,
        Stage::Screening,
        Stage::TechnicalProbe,
        Stage::DeepDive,
        Stage::JobPitch,
        Stage::Feedback,
    ];

    /// The stage every interview starts in.
    pub const INITIAL: Stage = Stage::Welcome;

    /// The declared successor, or `None` for the terminal stage.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Welcome => Some(Stage::Screening),
            Stage::Screening => Some(Stage::TechnicalProbe),
            Stage::TechnicalProbe => Some(Stage::DeepDive),
            Stage::DeepDive => Some(Stage::JobPitch),
            Stage::JobPitch => Some(Stage::Feedback),
            Stage::Feedback => None,
        }
    }

    /// Whether this stage ends the interview script.
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// The raw instruction template for this stage.
    pub fn template(self) -> &'static str {
        match self {
            Stage::Welcome => WELCOME_TEMPLATE,
            Stage::Screening => SCREENING_TEMPLATE,
            Stage::TechnicalProbe => TECHNICAL_PROBE_TEMPLATE,
            Stage::DeepDive => DEEP_DIVE_TEMPLATE,
            Stage::JobPitch => JOB_PITCH_TEMPLATE,
            Stage::Feedback => FEEDBACK_TEMPLATE,
        }
    }

    /// The wire label for this stage, e.g. `TECHNICAL_PROBE`.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Welcome => "WELCOME",
            Stage::Screening => "SCREENING",
            Stage::TechnicalProbe => "TECHNICAL_PROBE",
            Stage::DeepDive => "DEEP_DIVE",
            Stage::JobPitch => "JOB_PITCH",
            Stage::Feedback => "FEEDBACK",
        }
    }

    /// Resolves a stage label, failing closed.
    ///
    /// A corrupt or stale label must never crash a live call, so anything
    /// unrecognized resolves to the initial stage rather than an error.
    pub fn parse(label: &str) -> Stage {
        let wanted = label.trim().to_ascii_uppercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.label() == wanted)
            .unwrap_or(Stage::INITIAL)
    }

    /// The whole graph as a `label -> template` JSON map.
    ///
    /// Handed to the oversight agent so it can identify the successor stage
    /// and compose a stage-appropriate bridge line.
    pub fn graph_json() -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = Stage::ALL
            .into_iter()
            .map(|stage| (stage.label().to_string(), stage.template().into()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
