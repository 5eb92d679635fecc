//! Protocol message definitions
//!
//! All message types exchanged between the agent and the room gateway.
//! Messages are serialized as JSON with a type discriminator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProtocolVersion;
use crate::room::{AutoSubscribe, RemoteParticipant, TrackKind};

// ─────────────────────────────────────────────────────────────────
// Message Envelope
// ─────────────────────────────────────────────────────────────────

/// Wrapper for all protocol messages with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Unique message ID
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Message timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Protocol version
    #[serde(default)]
    pub version: ProtocolVersion,

    /// The actual message payload
    #[serde(flatten)]
    pub payload: Message,
}

impl MessageEnvelope {
    /// Create a new message envelope
    pub fn new(payload: Message) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            version: ProtocolVersion::default(),
            payload,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Message Types (Discriminated Union)
// ─────────────────────────────────────────────────────────────────

/// All protocol messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    // ─── Agent → Gateway ────────────────────────────────────────
    /// Join a room
    Join(JoinRequest),

    /// Leave the room
    Leave(LeaveMessage),

    // ─── Gateway → Agent ────────────────────────────────────────
    /// Join acknowledgment
    JoinAck(JoinAckResponse),

    /// A participant entered the room
    ParticipantJoined(ParticipantJoinedMessage),

    /// A participant left the room
    ParticipantLeft(ParticipantLeftMessage),

    /// A participant published a track
    TrackPublished(TrackMessage),

    /// The agent is now subscribed to a track
    TrackSubscribed(TrackMessage),

    /// Error report
    Error(ErrorMessage),
}

impl Message {
    /// Get the message type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Join(_) => "JOIN",
            Message::Leave(_) => "LEAVE",
            Message::JoinAck(_) => "JOIN_ACK",
            Message::ParticipantJoined(_) => "PARTICIPANT_JOINED",
            Message::ParticipantLeft(_) => "PARTICIPANT_LEFT",
            Message::TrackPublished(_) => "TRACK_PUBLISHED",
            Message::TrackSubscribed(_) => "TRACK_SUBSCRIBED",
            Message::Error(_) => "ERROR",
        }
    }

    /// Check if this is sent by the agent
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Join(_) | Message::Leave(_))
    }
}

// ─────────────────────────────────────────────────────────────────
// Join / Leave
// ─────────────────────────────────────────────────────────────────

/// Join request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Room name
    pub room: String,

    /// Agent participant identity
    pub identity: String,

    /// Agent name (dispatch label)
    pub agent_name: String,

    /// Subscription policy
    #[serde(default)]
    pub auto_subscribe: AutoSubscribe,
}

/// Join acknowledgment from the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinAckResponse {
    /// Whether the join succeeded
    pub success: bool,

    /// Server-assigned room id
    #[serde(default)]
    pub room_sid: Option<String>,

    /// Participants already in the room
    #[serde(default)]
    pub participants: Vec<RemoteParticipant>,

    /// Any error message
    #[serde(default)]
    pub error: Option<String>,
}

/// Leave notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveMessage {
    pub reason: String,
}

// ─────────────────────────────────────────────────────────────────
// Room Events
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantJoinedMessage {
    pub participant: RemoteParticipant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantLeftMessage {
    pub identity: String,
}

/// Track publication or subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackMessage {
    /// Identity of the track owner
    pub participant: String,

    pub kind: TrackKind,

    pub track_sid: String,
}

/// Error message from the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code
    pub code: String,

    /// Human-readable message
    pub message: String,

    /// Whether the connection is being closed
    #[serde(default)]
    pub fatal: bool,
}

// ─────────────────────────────────────────────────────────────────
// Message Helpers
// ─────────────────────────────────────────────────────────────────

impl MessageEnvelope {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from JSON bytes
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
