//! The per-call interview state machine.
//!
//! One machine exists per live call. It owns the current stage, the active
//! junior instruction, and the transcript; everything that happens on a call
//! is funneled through [`InterviewMachine::apply`] as a [`SessionEvent`], and
//! the resulting [`Applied`] effect tells the caller what actually changed.
//!
//! Stages only ever move forward, one step at a time. There is no path that
//! skips a stage or returns to an earlier one.

use crate::senior::{Disposition, SeniorVerdict};
use crate::stage::Stage;
use crate::transcript::{Speaker, Transcript};
use tracing::{info, warn};

/// An input to the machine.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A finished spoken turn from either side of the call.
    Utterance { speaker: Speaker, text: String },
    /// A verdict from the senior oversight pass.
    Oversight(SeniorVerdict),
    /// Operator override: step forward one stage without oversight.
    ForceAdvance,
}

/// What an applied event actually changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// No externally visible change.
    Unchanged,
    /// Same stage, but the junior's instruction was replaced.
    InstructionRefreshed { stage: Stage },
    /// The interview moved to the next stage.
    StageChanged { from: Stage, to: Stage },
    /// The interview was concluded in place.
    Concluded { stage: Stage },
}

/// The state machine for one interview.
#[derive(Debug)]
pub struct InterviewMachine {
    stage: Stage,
    instruction: String,
    /// Every instruction that has ever been in force, oldest first. Superseded
    /// entries are kept; the last entry is always the active instruction.
    instruction_history: Vec<String>,
    last_critique: Option<String>,
    transcript: Transcript,
    concluded: bool,
}

impl Default for InterviewMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl InterviewMachine {
    /// A fresh interview: first stage, speaking from that stage's template.
    pub fn new() -> Self {
        let opening = Stage::INITIAL.template().to_string();
        Self {
            stage: Stage::INITIAL,
            instruction: opening.clone(),
            instruction_history: vec![opening],
            last_critique: None,
            transcript: Transcript::new(),
            concluded: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The instruction the junior is currently speaking from.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn instruction_history(&self) -> &[String] {
        &self.instruction_history
    }

    /// The critique from the most recent oversight decision applied here.
    pub fn last_critique(&self) -> Option<&str> {
        self.last_critique.as_deref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_concluded(&self) -> bool {
        self.concluded
    }

    /// Applies one event and reports the effect.
    ///
    /// Utterances append to the transcript in every state, conclusion
    /// included; the closing exchange spoken after a terminate verdict still
    /// belongs to the record. A concluded machine absorbs all stage-affecting
    /// events unchanged.
    pub fn apply(&mut self, event: SessionEvent) -> Applied {
        match event {
            SessionEvent::Utterance { speaker, text } => {
                self.transcript.push(speaker, text);
                Applied::Unchanged
            }
            _ if self.concluded => Applied::Unchanged,
            SessionEvent::Oversight(verdict) => self.apply_verdict(verdict),
            SessionEvent::ForceAdvance => self.advance(None),
        }
    }

    fn apply_verdict(&mut self, verdict: SeniorVerdict) -> Applied {
        // The decision is recorded before any mutation it authorizes.
        self.last_critique = Some(verdict.critique);
        match verdict.disposition {
            Disposition::Remain => match verdict.instruction {
                Some(instruction) => {
                    self.install_instruction(instruction);
                    info!(stage = %self.stage, "instruction refreshed in place");
                    Applied::InstructionRefreshed { stage: self.stage }
                }
                None => Applied::Unchanged,
            },
            Disposition::Advance => self.advance(verdict.instruction),
            Disposition::Terminate => {
                // The stage pointer never jumps, not even to end the call;
                // conclusion is a flag on the current stage.
                if let Some(instruction) = verdict.instruction {
                    self.install_instruction(instruction);
                }
                self.concluded = true;
                info!(stage = %self.stage, "interview concluded");
                Applied::Concluded { stage: self.stage }
            }
        }
    }

    /// Steps forward exactly one stage. The replacement instruction is taken
    /// from the verdict when present, otherwise from the successor's own
    /// template. An advance past the terminal stage is clamped in place; the
    /// composed instruction is dropped with it, since it targets a stage that
    /// does not exist.
    fn advance(&mut self, instruction: Option<String>) -> Applied {
        let from = self.stage;
        let Some(to) = from.next() else {
            warn!(stage = %from, "advance requested at the terminal stage; remaining");
            return Applied::Unchanged;
        };
        self.stage = to;
        self.install_instruction(instruction.unwrap_or_else(|| to.template().to_string()));
        info!(%from, %to, "stage advanced");
        Applied::StageChanged { from, to }
    }

    fn install_instruction(&mut self, instruction: String) {
        self.instruction_history.push(instruction.clone());
        self.instruction = instruction;
    }
}
