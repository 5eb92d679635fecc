//! Turn-detection policy handed to the realtime engine.

use serde::{Deserialize, Serialize};

/// Voice-activity parameters that decide when the user has finished a turn.
///
/// Built once per session by [`TurnDetectionPolicy::conservative`] and passed
/// to the engine unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnDetectionPolicy {
    /// Voice-activity threshold (0.0 - 1.0). Higher ignores more background noise.
    pub sensitivity_threshold: f32,

    /// Audio kept before detected speech, in milliseconds
    pub prefix_padding_ms: u32,

    /// Silence required before the user's turn is considered over, in milliseconds
    pub silence_duration_ms: u32,

    /// Engine responds automatically at end of turn
    pub auto_respond: bool,

    /// Whether user speech interrupts the agent mid-utterance
    pub allow_barge_in: bool,
}

impl TurnDetectionPolicy {
    /// The fixed policy every session uses: slow to decide the user is done,
    /// never cut off by background noise.
    pub const fn conservative() -> Self {
        Self {
            sensitivity_threshold: 0.7,
            prefix_padding_ms: 400,
            silence_duration_ms: 1000,
            auto_respond: true,
            allow_barge_in: false,
        }
    }
}

impl Default for TurnDetectionPolicy {
    fn default() -> Self {
        Self::conservative()
    }
}

/// The policy for a new session.
pub fn configure_turn_detection() -> TurnDetectionPolicy {
    TurnDetectionPolicy::conservative()
}
