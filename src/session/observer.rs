//! Lifecycle observers
//!
//! Observers receive diagnostic signals from the room and the engine. They
//! are passive: they get a shared reference to the event and return nothing,
//! so they cannot steer the session.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::room::TrackKind;

/// Diagnostic signal raised while a session runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    TrackPublished { participant: String, kind: TrackKind },
    TrackSubscribed { participant: String, kind: TrackKind },
    AgentStartedSpeaking,
    AgentStoppedSpeaking,
    UserStartedSpeaking,
    UserStoppedSpeaking,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::TrackPublished { .. } => "track_published",
            LifecycleEvent::TrackSubscribed { .. } => "track_subscribed",
            LifecycleEvent::AgentStartedSpeaking => "agent_started_speaking",
            LifecycleEvent::AgentStoppedSpeaking => "agent_stopped_speaking",
            LifecycleEvent::UserStartedSpeaking => "user_started_speaking",
            LifecycleEvent::UserStoppedSpeaking => "user_stopped_speaking",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::TrackPublished { participant, kind }
            | LifecycleEvent::TrackSubscribed { participant, kind } => {
                write!(f, "{} ({} from {})", self.name(), kind, participant)
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// Receives lifecycle events
pub trait LifecycleObserver: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

/// Default observer: one log line per event
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl LifecycleObserver for LoggingObserver {
    fn on_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::TrackPublished { participant, kind } => {
                info!(participant = %participant, kind = %kind, "Track published");
            }
            LifecycleEvent::TrackSubscribed { participant, kind } => {
                info!(participant = %participant, kind = %kind, "Track subscribed");
            }
            other => {
                info!(event = other.name(), "Session event");
            }
        }
    }
}

/// Keeps every event it sees, in order
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl LifecycleObserver for EventRecorder {
    fn on_event(&self, event: &LifecycleEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_keeps_order() {
        let recorder = EventRecorder::new();
        recorder.on_event(&LifecycleEvent::UserStartedSpeaking);
        recorder.on_event(&LifecycleEvent::UserStoppedSpeaking);
        recorder.on_event(&LifecycleEvent::AgentStartedSpeaking);

        assert_eq!(
            recorder.events(),
            vec![
                LifecycleEvent::UserStartedSpeaking,
                LifecycleEvent::UserStoppedSpeaking,
                LifecycleEvent::AgentStartedSpeaking,
            ]
        );
    }

    #[test]
    fn test_event_display() {
        let event = LifecycleEvent::TrackSubscribed {
            participant: "alice".into(),
            kind: TrackKind::Audio,
        };
        assert_eq!(event.to_string(), "track_subscribed (audio from alice)");
        assert_eq!(LifecycleEvent::AgentStoppedSpeaking.to_string(), "agent_stopped_speaking");
    }

    #[test]
    fn test_event_serialize() {
        let json = serde_json::to_string(&LifecycleEvent::TrackPublished {
            participant: "bob".into(),
            kind: TrackKind::Audio,
        })
        .unwrap();
        assert!(json.contains("\"event\":\"track_published\""));
        assert!(json.contains("\"kind\":\"audio\""));
    }
}
