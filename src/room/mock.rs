//! Mock room for tests and the `simulate` command
//!
//! Behaves like a room with one participant who joins immediately, then
//! replays a fixed script of room events.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::{AutoSubscribe, RemoteParticipant, RoomBinding, RoomEvent, RoomTransport, TrackKind};

// ─────────────────────────────────────────────────────────────────
// Mock Room Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock room behavior
#[derive(Debug, Clone)]
pub struct MockRoomConfig {
    /// Fail `connect` with a transport error
    pub fail_connect: bool,

    /// The participant who joins; `None` means nobody ever joins
    pub participant: Option<RemoteParticipant>,

    /// Events delivered after the join, in order
    pub events: Vec<RoomEvent>,

    /// Delay between scripted events
    pub event_interval: Duration,

    /// After the script, wait this long and then have the participant leave
    pub leave_after: Option<Duration>,
}

impl Default for MockRoomConfig {
    fn default() -> Self {
        Self {
            fail_connect: false,
            participant: Some(RemoteParticipant::new("practice-user")),
            events: Vec::new(),
            event_interval: Duration::from_millis(5),
            leave_after: None,
        }
    }
}

impl MockRoomConfig {
    /// A participant with `metadata`, who publishes a microphone and leaves
    /// after the scripted conversation.
    pub fn scripted(metadata: Option<&str>) -> Self {
        let identity = "practice-user".to_string();
        let mut participant = RemoteParticipant::new(identity.clone());
        participant.metadata = metadata.map(str::to_string);

        Self {
            participant: Some(participant),
            events: vec![
                RoomEvent::TrackPublished {
                    participant: identity.clone(),
                    kind: TrackKind::Audio,
                    track_sid: "TR_mic".to_string(),
                },
                RoomEvent::TrackSubscribed {
                    participant: identity.clone(),
                    kind: TrackKind::Audio,
                    track_sid: "TR_mic".to_string(),
                },
            ],
            leave_after: Some(Duration::from_millis(200)),
            ..Default::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Mock Room
// ─────────────────────────────────────────────────────────────────

/// Mock implementation of [`RoomTransport`]
pub struct MockRoom {
    config: MockRoomConfig,
    event_tx: Option<mpsc::Sender<RoomEvent>>,
    event_rx: Option<mpsc::Receiver<RoomEvent>>,
    calls: RwLock<CallLog>,
}

/// What the session asked of the room
#[derive(Debug, Default, Clone)]
pub struct CallLog {
    pub joined_room: Option<String>,
    pub subscribe: Option<AutoSubscribe>,
    pub disconnect_reason: Option<String>,
}

impl MockRoom {
    pub fn new(config: MockRoomConfig) -> Self {
        Self {
            config,
            event_tx: None,
            event_rx: None,
            calls: RwLock::new(CallLog::default()),
        }
    }

    /// Snapshot of the calls made so far
    pub fn calls(&self) -> CallLog {
        self.calls.read().clone()
    }
}

impl Default for MockRoom {
    fn default() -> Self {
        Self::new(MockRoomConfig::default())
    }
}

#[async_trait]
impl RoomTransport for MockRoom {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&mut self, room: &str, subscribe: AutoSubscribe) -> Result<RoomBinding> {
        if self.config.fail_connect {
            return Err(Error::transport("mock://room", room, "connection refused"));
        }

        {
            let mut calls = self.calls.write();
            calls.joined_room = Some(room.to_string());
            calls.subscribe = Some(subscribe);
        }

        let (tx, rx) = mpsc::channel(32);
        self.event_tx = Some(tx);
        self.event_rx = Some(rx);

        Ok(RoomBinding {
            room: room.to_string(),
            room_sid: Some(format!("RM_mock_{}", room)),
            identity: "practice-partner-mock".to_string(),
        })
    }

    async fn wait_for_participant(&mut self) -> Result<RemoteParticipant> {
        let participant = match self.config.participant.clone() {
            Some(participant) => participant,
            None => std::future::pending().await,
        };

        // Start the scripted events once somebody is there to produce them
        if let Some(tx) = self.event_tx.clone() {
            let events = self.config.events.clone();
            let interval = self.config.event_interval;
            let leave_after = self.config.leave_after;
            let identity = participant.identity.clone();
            tokio::spawn(async move {
                for event in events {
                    tokio::time::sleep(interval).await;
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                if let Some(delay) = leave_after {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(RoomEvent::ParticipantLeft { identity }).await;
                }
            });
        }

        Ok(participant)
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<RoomEvent>> {
        self.event_rx.take()
    }

    async fn disconnect(&mut self, reason: &str) -> Result<()> {
        self.calls.write().disconnect_reason = Some(reason.to_string());
        self.event_tx = None;
        Ok(())
    }
}
