//! In-memory bookkeeping for live interview sessions.
//!
//! Each media-stream connection registers itself here for its lifetime. The
//! registry answers the REST surface from digest snapshots (never by touching
//! a session's own state) and fans observer events out over a broadcast
//! channel. Commands travel the other way: a registered session hands over an
//! mpsc sender, and operator requests are forwarded through it into the
//! session's event loop.

use crate::models::SessionSummary;
use crate::ws::protocol::ObserverMessage;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;
use viva_core::machine::InterviewMachine;
use viva_core::stage::Stage;

const OBSERVER_CHANNEL_CAPACITY: usize = 64;

/// Operator commands injected into a running session.
#[derive(Debug)]
pub enum SessionCommand {
    /// Advance the interview one stage, bypassing oversight.
    ForceAdvance,
}

/// A point-in-time summary a session pushes after every state change.
#[derive(Debug, Clone)]
pub struct SessionDigest {
    pub stage: String,
    pub turns: usize,
    pub concluded: bool,
}

impl Default for SessionDigest {
    fn default() -> Self {
        Self {
            stage: Stage::INITIAL.label().to_string(),
            turns: 0,
            concluded: false,
        }
    }
}

impl From<&InterviewMachine> for SessionDigest {
    fn from(machine: &InterviewMachine) -> Self {
        Self {
            stage: machine.stage().to_string(),
            turns: machine.transcript().len(),
            concluded: machine.is_concluded(),
        }
    }
}

struct SessionEntry {
    command_tx: mpsc::Sender<SessionCommand>,
    started_at: DateTime<Utc>,
    digest: SessionDigest,
}

pub struct Registry {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    events: broadcast::Sender<ObserverMessage>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(OBSERVER_CHANNEL_CAPACITY);
        Self {
            sessions: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Makes a new session visible to the REST surface and routable for
    /// operator commands. Every session begins in the initial stage.
    pub fn register(&self, session_id: Uuid, command_tx: mpsc::Sender<SessionCommand>) {
        let entry = SessionEntry {
            command_tx,
            started_at: Utc::now(),
            digest: SessionDigest::default(),
        };
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .insert(session_id, entry);
    }

    pub fn update(&self, session_id: Uuid, digest: SessionDigest) {
        if let Some(entry) = self
            .sessions
            .lock()
            .expect("session registry poisoned")
            .get_mut(&session_id)
        {
            entry.digest = digest;
        }
    }

    pub fn remove(&self, session_id: Uuid) {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .remove(&session_id);
    }

    pub fn snapshot(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock().expect("session registry poisoned");
        let mut summaries: Vec<SessionSummary> = sessions
            .iter()
            .map(|(id, entry)| SessionSummary {
                id: *id,
                stage: entry.digest.stage.clone(),
                turns: entry.digest.turns,
                concluded: entry.digest.concluded,
                started_at: entry.started_at,
            })
            .collect();
        summaries.sort_by_key(|summary| summary.started_at);
        summaries
    }

    /// Forwards a force-advance to the session's event loop.
    ///
    /// Returns false when the session is unknown or already tearing down.
    /// The sender is cloned out of the lock before awaiting.
    pub async fn force_advance(&self, session_id: Uuid) -> bool {
        let command_tx = {
            let sessions = self.sessions.lock().expect("session registry poisoned");
            match sessions.get(&session_id) {
                Some(entry) => entry.command_tx.clone(),
                None => return false,
            }
        };
        command_tx.send(SessionCommand::ForceAdvance).await.is_ok()
    }

    /// Fire-and-forget fan-out. A send error only means nobody is watching.
    pub fn broadcast(&self, message: ObserverMessage) {
        let _ = self.events.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ObserverMessage> {
        self.events.subscribe()
    }
}
