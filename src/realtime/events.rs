//! Realtime API wire events
//!
//! Only the subset the agent sends or reacts to. Unknown server events
//! deserialize to [`ServerEvent::Other`] and are ignored.

use serde::{Deserialize, Serialize};

use crate::session::TurnDetectionPolicy;

use super::{AgentSpec, Modality};

// ─────────────────────────────────────────────────────────────────
// Client → Server
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdate },

    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseCreate },
}

impl ClientEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::ResponseCreate { .. } => "response.create",
        }
    }
}

/// Session configuration sent once after `session.created`
#[derive(Debug, Clone, Serialize)]
pub struct SessionUpdate {
    pub modalities: Vec<Modality>,
    pub instructions: String,
    pub voice: String,
    pub turn_detection: TurnDetection,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_noise_reduction: Option<NoiseReduction>,
}

impl From<&AgentSpec> for SessionUpdate {
    fn from(spec: &AgentSpec) -> Self {
        Self {
            modalities: spec.engine.modalities.clone(),
            instructions: spec.instructions.clone(),
            voice: spec.engine.voice.clone(),
            turn_detection: TurnDetection::from(&spec.engine.turn_detection),
            input_audio_noise_reduction: spec
                .input
                .noise_cancellation
                .then(NoiseReduction::near_field),
        }
    }
}

/// Server-side voice activity detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    pub create_response: bool,
    pub interrupt_response: bool,
}

impl From<&TurnDetectionPolicy> for TurnDetection {
    fn from(policy: &TurnDetectionPolicy) -> Self {
        Self {
            kind: "server_vad".to_string(),
            threshold: policy.sensitivity_threshold,
            prefix_padding_ms: policy.prefix_padding_ms,
            silence_duration_ms: policy.silence_duration_ms,
            create_response: policy.auto_respond,
            interrupt_response: policy.allow_barge_in,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoiseReduction {
    #[serde(rename = "type")]
    pub kind: String,
}

impl NoiseReduction {
    pub fn near_field() -> Self {
        Self {
            kind: "near_field".to_string(),
        }
    }
}

/// Out-of-band response request
#[derive(Debug, Clone, Serialize)]
pub struct ResponseCreate {
    pub instructions: String,
}

// ─────────────────────────────────────────────────────────────────
// Server → Client
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: serde_json::Value,
    },

    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: serde_json::Value,
    },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,

    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        response: ResponseInfo,
    },

    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: ResponseInfo,
    },

    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta {
        #[serde(default)]
        response_id: String,
    },

    #[serde(rename = "response.audio.done")]
    ResponseAudioDone {
        #[serde(default)]
        response_id: String,
    },

    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(other)]
    Other,
}

/// The `response` object of `response.created` / `response.done`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub id: String,

    /// `in_progress`, `completed`, `cancelled`, `failed` or `incomplete`
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub status_details: Option<serde_json::Value>,
}

impl ResponseInfo {
    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }

    /// Best-effort reason for a failed response
    pub fn failure_reason(&self) -> String {
        self.status_details
            .as_ref()
            .and_then(|details| details.pointer("/error/message"))
            .and_then(|message| message.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("response {} {}", self.id, self.status))
    }
}

/// Error body carried by an `error` event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, self.kind.is_empty()) {
            (Some(code), _) => write!(f, "{} ({}): {}", self.kind, code, self.message),
            (None, false) => write!(f, "{}: {}", self.kind, self.message),
            (None, true) => write!(f, "{}", self.message),
        }
    }
}
