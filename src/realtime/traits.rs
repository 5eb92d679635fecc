//! Realtime engine trait definitions
//!
//! The speech/LLM engine is an external collaborator. The session hands it a
//! complete [`AgentSpec`] once and then only asks for a greeting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::room::RoomBinding;
use crate::session::TurnDetectionPolicy;

// ─────────────────────────────────────────────────────────────────
// Engine Configuration
// ─────────────────────────────────────────────────────────────────

/// Output channel the engine may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Audio,
    Text,
}

/// Voice, model and turn policy for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub voice: String,
    pub modalities: Vec<Modality>,
    pub model: String,
    pub turn_detection: TurnDetectionPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voice: "alloy".to_string(),
            modalities: vec![Modality::Audio, Modality::Text],
            model: "gpt-4o-realtime-preview".to_string(),
            turn_detection: TurnDetectionPolicy::conservative(),
        }
    }
}

/// How the room audio is fed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInputOptions {
    pub noise_cancellation: bool,
}

impl Default for RoomInputOptions {
    fn default() -> Self {
        Self {
            noise_cancellation: true,
        }
    }
}

/// Everything the engine needs to start a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// System prompt
    pub instructions: String,
    pub engine: EngineConfig,
    pub input: RoomInputOptions,
}

// ─────────────────────────────────────────────────────────────────
// Engine Events
// ─────────────────────────────────────────────────────────────────

/// Signals raised by the engine once the session is live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    AgentStartedSpeaking,
    AgentStoppedSpeaking,
    UserStartedSpeaking,
    UserStoppedSpeaking,

    /// Non-fatal error reported by the engine
    Error { message: String },

    /// The engine connection ended
    Closed,
}

// ─────────────────────────────────────────────────────────────────
// RealtimeEngine Trait
// ─────────────────────────────────────────────────────────────────

/// Speech-to-speech inference engine
#[async_trait]
pub trait RealtimeEngine: Send {
    /// Short name for logs (e.g. "openai", "mock")
    fn name(&self) -> &'static str;

    /// Configure the engine and bind it to the joined room.
    ///
    /// Returns the engine's event stream. Rejection is a
    /// [`SessionStart`](crate::error::Error::SessionStart) error.
    async fn start(
        &mut self,
        spec: &AgentSpec,
        room: &RoomBinding,
    ) -> Result<mpsc::Receiver<EngineEvent>>;

    /// Ask the agent to speak with one-off `instructions`
    async fn generate_reply(&mut self, instructions: &str) -> Result<()>;

    /// End the engine session
    async fn close(&mut self) -> Result<()>;
}
