//! Session lifecycle state machine
//!
//! States only move forward. `Closed` and `Failed` are terminal and can be
//! entered from any live state.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Session State
// ─────────────────────────────────────────────────────────────────

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Joining the room
    Connecting,
    /// Joined, waiting for a human
    AwaitingParticipant,
    /// Reading metadata and building the prompt
    ResolvingContext,
    /// Building the engine configuration
    Configuring,
    /// Engine accepted the configuration
    Active,
    /// Opening line requested
    Greeting,
    /// Conversation in progress
    Running,
    /// Torn down normally
    Closed,
    /// Ended by a fatal error
    Failed,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Connecting
    }
}

impl SessionState {
    fn rank(self) -> u8 {
        match self {
            SessionState::Connecting => 0,
            SessionState::AwaitingParticipant => 1,
            SessionState::ResolvingContext => 2,
            SessionState::Configuring => 3,
            SessionState::Active => 4,
            SessionState::Greeting => 5,
            SessionState::Running => 6,
            SessionState::Closed | SessionState::Failed => 7,
        }
    }

    /// Whether the session has ended
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Whether `next` is a legal move from `self`
    pub fn can_transition_to(self, next: SessionState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::AwaitingParticipant => "awaiting_participant",
            SessionState::ResolvingContext => "resolving_context",
            SessionState::Configuring => "configuring",
            SessionState::Active => "active",
            SessionState::Greeting => "greeting",
            SessionState::Running => "running",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// State Tracker
// ─────────────────────────────────────────────────────────────────

/// Current state plus the time each state was entered
#[derive(Debug)]
pub struct StateTracker {
    current: SessionState,
    entered_at: Instant,
    history: Vec<(SessionState, Instant)>,
}

impl Default for StateTracker {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            current: SessionState::Connecting,
            entered_at: now,
            history: vec![(SessionState::Connecting, now)],
        }
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> SessionState {
        self.current
    }

    /// Move to `next`, rejecting backwards moves and moves out of a terminal state.
    pub fn advance(&mut self, next: SessionState) -> Result<()> {
        if !self.current.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.current.to_string(),
                to: next.to_string(),
            });
        }
        let now = Instant::now();
        debug!(
            from = %self.current,
            to = %next,
            elapsed_ms = now.duration_since(self.entered_at).as_millis() as u64,
            "Session state changed"
        );
        self.current = next;
        self.entered_at = now;
        self.history.push((next, now));
        Ok(())
    }

    /// Every state visited, in order
    pub fn visited(&self) -> Vec<SessionState> {
        self.history.iter().map(|(s, _)| *s).collect()
    }
}
