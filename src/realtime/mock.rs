//! Mock realtime engine for tests and the `simulate` command

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::room::RoomBinding;

use super::{AgentSpec, EngineEvent, RealtimeEngine};

/// Configuration for mock engine behavior
#[derive(Debug, Clone)]
pub struct MockEngineConfig {
    /// Reject the session configuration
    pub fail_start: bool,

    /// Fail every `generate_reply`
    pub fail_greeting: bool,

    /// Events emitted after the greeting request
    pub script: Vec<EngineEvent>,

    /// Delay between scripted events
    pub event_interval: Duration,
}

impl Default for MockEngineConfig {
    fn default() -> Self {
        Self {
            fail_start: false,
            fail_greeting: false,
            script: vec![
                EngineEvent::AgentStartedSpeaking,
                EngineEvent::AgentStoppedSpeaking,
                EngineEvent::UserStartedSpeaking,
                EngineEvent::UserStoppedSpeaking,
            ],
            event_interval: Duration::from_millis(5),
        }
    }
}

/// What the session handed to the engine
#[derive(Debug, Default, Clone)]
pub struct EngineCalls {
    pub spec: Option<AgentSpec>,
    pub room: Option<String>,
    pub replies: Vec<String>,
    pub closed: bool,
}

/// Mock implementation of [`RealtimeEngine`]
pub struct MockEngine {
    config: MockEngineConfig,
    event_tx: Option<mpsc::Sender<EngineEvent>>,
    calls: RwLock<EngineCalls>,
}

impl MockEngine {
    pub fn new(config: MockEngineConfig) -> Self {
        Self {
            config,
            event_tx: None,
            calls: RwLock::new(EngineCalls::default()),
        }
    }

    pub fn calls(&self) -> EngineCalls {
        self.calls.read().clone()
    }

    fn play_script(&self) {
        let Some(tx) = self.event_tx.clone() else {
            return;
        };
        let script = self.config.script.clone();
        let interval = self.config.event_interval;
        tokio::spawn(async move {
            for event in script {
                tokio::time::sleep(interval).await;
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new(MockEngineConfig::default())
    }
}

#[async_trait]
impl RealtimeEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn start(
        &mut self,
        spec: &AgentSpec,
        room: &RoomBinding,
    ) -> Result<mpsc::Receiver<EngineEvent>> {
        {
            let mut calls = self.calls.write();
            calls.spec = Some(spec.clone());
            calls.room = Some(room.room.clone());
        }

        if self.config.fail_start {
            return Err(Error::session_start("mock engine rejected the configuration"));
        }

        let (tx, rx) = mpsc::channel(32);
        self.event_tx = Some(tx);
        Ok(rx)
    }

    async fn generate_reply(&mut self, instructions: &str) -> Result<()> {
        self.calls.write().replies.push(instructions.to_string());

        if self.config.fail_greeting {
            return Err(Error::Greeting {
                message: "mock engine refused to speak".to_string(),
            });
        }

        // A successful reply gets the conversation going
        self.play_script();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.calls.write().closed = true;
        self.event_tx = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{EngineConfig, RoomInputOptions};

    fn spec() -> AgentSpec {
        AgentSpec {
            instructions: "prompt".into(),
            engine: EngineConfig::default(),
            input: RoomInputOptions::default(),
        }
    }

    fn binding() -> RoomBinding {
        RoomBinding {
            room: "demo".into(),
            room_sid: None,
            identity: "agent".into(),
        }
    }

    #[tokio::test]
    async fn test_records_spec_and_plays_script() {
        let mut engine = MockEngine::default();
        let mut events = engine.start(&spec(), &binding()).await.unwrap();
        engine.generate_reply("hello").await.unwrap();

        assert_eq!(events.recv().await, Some(EngineEvent::AgentStartedSpeaking));
        let calls = engine.calls();
        assert_eq!(calls.spec.unwrap().instructions, "prompt");
        assert_eq!(calls.replies, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_fail_start() {
        let mut engine = MockEngine::new(MockEngineConfig {
            fail_start: true,
            ..Default::default()
        });
        let err = engine.start(&spec(), &binding()).await.unwrap_err();
        assert!(matches!(err, Error::SessionStart { .. }));
    }

    #[tokio::test]
    async fn test_fail_greeting_reports_greeting_error() {
        let mut engine = MockEngine::new(MockEngineConfig {
            fail_greeting: true,
            ..Default::default()
        });
        engine.start(&spec(), &binding()).await.unwrap();
        let err = engine.generate_reply("hello").await.unwrap_err();
        assert!(matches!(err, Error::Greeting { .. }));
    }
}
