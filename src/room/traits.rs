//! Room transport trait definitions
//!
//! The room platform (audio transport, participant management) is an
//! external collaborator. The session only sees it through [`RoomTransport`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────
// Room Types
// ─────────────────────────────────────────────────────────────────

/// Kind of media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
    Data,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
            TrackKind::Data => write!(f, "data"),
        }
    }
}

/// Which remote tracks the agent subscribes to on join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoSubscribe {
    SubscribeAll,
    SubscribeNone,
    AudioOnly,
    VideoOnly,
}

impl Default for AutoSubscribe {
    fn default() -> Self {
        AutoSubscribe::AudioOnly
    }
}

/// A published track on a remote participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub sid: String,
    pub kind: TrackKind,
}

/// A human (or other non-agent) participant in the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteParticipant {
    /// Unique identity within the room
    pub identity: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Opaque metadata string supplied by the client (JSON by convention)
    #[serde(default)]
    pub metadata: Option<String>,

    /// Tracks published so far
    #[serde(default)]
    pub tracks: Vec<TrackInfo>,
}

impl RemoteParticipant {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            name: None,
            metadata: None,
            tracks: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

/// The joined room, handed to the engine so it can bind to the room's audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomBinding {
    pub room: String,
    pub room_sid: Option<String>,
    pub identity: String,
}

/// Events raised by the room after the join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A participant published a track
    TrackPublished {
        participant: String,
        kind: TrackKind,
        track_sid: String,
    },

    /// The agent subscribed to a participant's track
    TrackSubscribed {
        participant: String,
        kind: TrackKind,
        track_sid: String,
    },

    /// A participant left
    ParticipantLeft { identity: String },

    /// The connection to the room ended
    Disconnected { reason: String },
}

// ─────────────────────────────────────────────────────────────────
// RoomTransport Trait
// ─────────────────────────────────────────────────────────────────

/// Connection to a real-time audio room
#[async_trait]
pub trait RoomTransport: Send {
    /// Short name for logs (e.g. "gateway", "mock")
    fn name(&self) -> &'static str;

    /// Join `room`, subscribing according to `subscribe`
    async fn connect(&mut self, room: &str, subscribe: AutoSubscribe) -> Result<RoomBinding>;

    /// Suspend until a remote participant is present. The first one wins.
    async fn wait_for_participant(&mut self) -> Result<RemoteParticipant>;

    /// Event stream for the joined room. Yields `Some` once per connection.
    fn take_events(&mut self) -> Option<mpsc::Receiver<RoomEvent>>;

    /// Leave the room
    async fn disconnect(&mut self, reason: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_subscribe_default() {
        assert_eq!(AutoSubscribe::default(), AutoSubscribe::AudioOnly);
        assert_eq!(
            serde_json::to_string(&AutoSubscribe::AudioOnly).unwrap(),
            "\"audio_only\""
        );
    }

    #[test]
    fn test_participant_deserialize_minimal() {
        let p: RemoteParticipant = serde_json::from_str(r#"{"identity":"user-1"}"#).unwrap();
        assert_eq!(p, RemoteParticipant::new("user-1"));
    }

    #[test]
    fn test_participant_with_tracks() {
        let p: RemoteParticipant = serde_json::from_str(
            r#"{"identity":"user-1","name":"Sam","metadata":"{\"persona\":\"peer\"}",
                "tracks":[{"sid":"TR_1","kind":"audio"}]}"#,
        )
        .unwrap();
        assert_eq!(p.name.as_deref(), Some("Sam"));
        assert_eq!(p.metadata.as_deref(), Some(r#"{"persona":"peer"}"#));
        assert_eq!(p.tracks[0].kind, TrackKind::Audio);
    }
}
