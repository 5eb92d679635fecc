//! Session orchestrator
//!
//! Drives one practice session from room join to teardown:
//! connect, wait for the first participant, resolve the persona from their
//! metadata, start the engine, greet, then relay lifecycle events to the
//! observers until the room or the engine goes away.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::PartnerConfig;
use crate::error::{Error, Result};
use crate::persona::PersonaCatalog;
use crate::realtime::{
    AgentSpec, EngineConfig, EngineEvent, Modality, RealtimeEngine, RoomInputOptions,
};
use crate::room::{AutoSubscribe, RemoteParticipant, RoomBinding, RoomEvent, RoomTransport};

use super::{
    configure_turn_detection, LifecycleEvent, LifecycleObserver, LoggingObserver, SessionContext,
    SessionState, StateTracker,
};

/// One-off instruction for the agent's opening line
pub const GREETING_INSTRUCTIONS: &str = "Greet the user warmly and briefly in ENGLISH ONLY. \
Keep it to 1-2 sentences. Don't ask a question yet, just say hello. You MUST speak in English.";

// ─────────────────────────────────────────────────────────────────
// Session Settings
// ─────────────────────────────────────────────────────────────────

/// Per-process session settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Bound on the participant wait; `None` waits forever
    pub participant_timeout: Option<Duration>,

    pub voice: String,
    pub model: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            participant_timeout: None,
            voice: engine.voice,
            model: engine.model,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &PartnerConfig) -> Self {
        let timeout = config.room.participant_timeout_secs;
        Self {
            participant_timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            voice: config.realtime.voice.clone(),
            model: config.realtime.model.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Session Summary
// ─────────────────────────────────────────────────────────────────

/// Outcome of a finished session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub room: String,
    pub participant: Option<String>,
    pub persona_key: Option<String>,
    pub final_state: SessionState,
    pub greeting_error: Option<String>,
    pub events_observed: usize,
    pub end_reason: String,
}

// ─────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────

/// Runs a single session over a room transport and a realtime engine
pub struct SessionOrchestrator<R, E> {
    settings: SessionSettings,
    catalog: Arc<PersonaCatalog>,
    room: R,
    engine: E,
    observers: Vec<Arc<dyn LifecycleObserver>>,

    tracker: StateTracker,
    room_name: String,
    binding: Option<RoomBinding>,
    participant: Option<RemoteParticipant>,
    context: Option<SessionContext>,
    room_events: Option<mpsc::Receiver<RoomEvent>>,
    engine_events: Option<mpsc::Receiver<EngineEvent>>,
    greeting_error: Option<String>,
    events_observed: usize,
}

impl<R, E> SessionOrchestrator<R, E>
where
    R: RoomTransport,
    E: RealtimeEngine,
{
    /// New orchestrator with the logging observer attached
    pub fn new(settings: SessionSettings, catalog: Arc<PersonaCatalog>, room: R, engine: E) -> Self {
        Self {
            settings,
            catalog,
            room,
            engine,
            observers: vec![Arc::new(LoggingObserver)],
            tracker: StateTracker::new(),
            room_name: String::new(),
            binding: None,
            participant: None,
            context: None,
            room_events: None,
            engine_events: None,
            greeting_error: None,
            events_observed: 0,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn state(&self) -> SessionState {
        self.tracker.current()
    }

    pub fn visited(&self) -> Vec<SessionState> {
        self.tracker.visited()
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn greeting_error(&self) -> Option<&str> {
        self.greeting_error.as_deref()
    }

    pub fn room(&self) -> &R {
        &self.room
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    // ─────────────────────────────────────────────────────────────
    // Whole Session
    // ─────────────────────────────────────────────────────────────

    /// Run a session in `room` until it ends on its own
    pub async fn run(&mut self, room: &str) -> Result<SessionSummary> {
        self.run_with_shutdown(room, std::future::pending()).await
    }

    /// Run a session in `room`, ending early when `shutdown` completes.
    ///
    /// Fatal errors move the session to `Failed`, tear down and are returned.
    pub async fn run_with_shutdown<F>(&mut self, room: &str, shutdown: F) -> Result<SessionSummary>
    where
        F: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            result = self.drive(room) => result,
            _ = shutdown => {
                info!(room = %room, state = %self.state(), "Shutdown requested");
                Ok("shutdown requested".to_string())
            }
        };

        match outcome {
            Ok(reason) => {
                self.teardown(&reason).await;
                self.tracker.advance(SessionState::Closed)?;
                info!(room = %room, reason = %reason, events = self.events_observed, "Session closed");
                Ok(self.summary(reason))
            }
            Err(e) => {
                error!(
                    room = %room,
                    state = %self.state(),
                    error = %e.format_for_log(),
                    "Session failed"
                );
                self.teardown(&e.to_string()).await;
                if let Err(transition) = self.tracker.advance(SessionState::Failed) {
                    debug!(error = %transition, "Session already terminal");
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self, room: &str) -> Result<String> {
        self.connect(room).await?;
        self.await_participant().await?;
        self.resolve_context()?;
        let spec = self.configure()?;
        self.start_session(&spec).await?;
        self.issue_greeting().await?;
        Ok(self.observe().await)
    }

    fn summary(&self, end_reason: String) -> SessionSummary {
        SessionSummary {
            room: self.room_name.clone(),
            participant: self.participant.as_ref().map(|p| p.identity.clone()),
            persona_key: self.context.as_ref().map(|c| c.persona_key.clone()),
            final_state: self.state(),
            greeting_error: self.greeting_error.clone(),
            events_observed: self.events_observed,
            end_reason,
        }
    }

    async fn teardown(&mut self, reason: &str) {
        if let Err(e) = self.engine.close().await {
            warn!(engine = self.engine.name(), error = %e, "Failed to close engine");
        }
        if let Err(e) = self.room.disconnect(reason).await {
            warn!(transport = self.room.name(), error = %e, "Failed to leave room");
        }
        self.room_events = None;
        self.engine_events = None;
    }

    // ─────────────────────────────────────────────────────────────
    // Steps
    // ─────────────────────────────────────────────────────────────

    /// Join `room` with an audio-only subscription
    pub async fn connect(&mut self, room: &str) -> Result<RoomBinding> {
        self.room_name = room.to_string();
        info!(room = %room, transport = self.room.name(), state = %self.state(), "Connecting");

        let binding = self.room.connect(room, AutoSubscribe::AudioOnly).await?;
        self.room_events = self.room.take_events();
        self.binding = Some(binding.clone());
        self.tracker.advance(SessionState::AwaitingParticipant)?;

        info!(room = %room, room_sid = ?binding.room_sid, "Waiting for a participant");
        Ok(binding)
    }

    /// Suspend until the first remote participant is present
    pub async fn await_participant(&mut self) -> Result<RemoteParticipant> {
        let participant = match self.settings.participant_timeout {
            Some(limit) => tokio::time::timeout(limit, self.room.wait_for_participant())
                .await
                .map_err(|_| Error::ParticipantTimeout {
                    room: self.room_name.clone(),
                    timeout_secs: limit.as_secs(),
                })??,
            None => self.room.wait_for_participant().await?,
        };

        info!(
            room = %self.room_name,
            participant = %participant.identity,
            has_metadata = participant.metadata.is_some(),
            "Participant joined"
        );
        self.participant = Some(participant.clone());
        self.tracker.advance(SessionState::ResolvingContext)?;
        Ok(participant)
    }

    /// Parse the participant's metadata and build the system prompt
    pub fn resolve_context(&mut self) -> Result<&SessionContext> {
        let participant = self
            .participant
            .as_ref()
            .ok_or_else(|| Error::Internal("no participant to resolve".into()))?;

        let context = SessionContext::from_metadata(&self.catalog, participant.metadata.as_deref());
        info!(
            room = %self.room_name,
            participant = %participant.identity,
            persona = %context.persona_key,
            event_type = ?context.event_type,
            user_role = ?context.user_role,
            "Persona resolved"
        );

        self.tracker.advance(SessionState::Configuring)?;
        Ok(self.context.insert(context))
    }

    /// Assemble the engine configuration. No I/O.
    pub fn configure(&self) -> Result<AgentSpec> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| Error::Internal("configure called before context".into()))?;

        Ok(AgentSpec {
            instructions: context.system_prompt.clone(),
            engine: EngineConfig {
                voice: self.settings.voice.clone(),
                modalities: vec![Modality::Audio, Modality::Text],
                model: self.settings.model.clone(),
                turn_detection: configure_turn_detection(),
            },
            input: RoomInputOptions::default(),
        })
    }

    /// Hand the configuration to the engine
    pub async fn start_session(&mut self, spec: &AgentSpec) -> Result<()> {
        let binding = self
            .binding
            .clone()
            .ok_or_else(|| Error::Internal("start_session called before connect".into()))?;

        self.tracker.advance(SessionState::Active)?;
        info!(
            room = %self.room_name,
            engine = self.engine.name(),
            voice = %spec.engine.voice,
            state = %self.state(),
            "Starting engine session"
        );

        let events = self.engine.start(spec, &binding).await?;
        self.engine_events = Some(events);
        self.tracker.advance(SessionState::Greeting)?;
        Ok(())
    }

    /// Ask the agent to open the conversation. A failure is logged and
    /// recorded; the session keeps running either way.
    pub async fn issue_greeting(&mut self) -> Result<()> {
        match self.engine.generate_reply(GREETING_INSTRUCTIONS).await {
            Ok(()) => {
                info!(
                    room = %self.room_name,
                    persona = ?self.context.as_ref().map(|c| &c.persona_key),
                    "Greeting issued"
                );
            }
            Err(e) => {
                warn!(room = %self.room_name, error = %e, "Greeting failed, continuing");
                self.greeting_error = Some(e.to_string());
            }
        }

        self.tracker.advance(SessionState::Running)
    }

    // ─────────────────────────────────────────────────────────────
    // Event Relay
    // ─────────────────────────────────────────────────────────────

    /// Relay events until the session ends. Returns why it ended.
    async fn observe(&mut self) -> String {
        loop {
            if self.room_events.is_none() && self.engine_events.is_none() {
                return "no event sources left".to_string();
            }

            tokio::select! {
                event = next_event(&mut self.room_events) => match event {
                    Some(event) => {
                        if let Some(reason) = self.on_room_event(event) {
                            return reason;
                        }
                    }
                    None => {
                        debug!("Room event stream ended");
                        self.room_events = None;
                    }
                },
                event = next_event(&mut self.engine_events) => match event {
                    Some(event) => {
                        if let Some(reason) = self.on_engine_event(event) {
                            return reason;
                        }
                    }
                    None => {
                        debug!("Engine event stream ended");
                        self.engine_events = None;
                    }
                },
            }
        }
    }

    fn on_room_event(&mut self, event: RoomEvent) -> Option<String> {
        match event {
            RoomEvent::TrackPublished {
                participant, kind, ..
            } => self.notify(LifecycleEvent::TrackPublished { participant, kind }),
            RoomEvent::TrackSubscribed {
                participant, kind, ..
            } => self.notify(LifecycleEvent::TrackSubscribed { participant, kind }),
            RoomEvent::ParticipantLeft { identity } => {
                let ours = self
                    .participant
                    .as_ref()
                    .map_or(false, |p| p.identity == identity);
                if ours {
                    return Some("participant left".to_string());
                }
                debug!(participant = %identity, "Other participant left");
            }
            RoomEvent::Disconnected { reason } => {
                return Some(format!("room disconnected: {}", reason));
            }
        }
        None
    }

    fn on_engine_event(&mut self, event: EngineEvent) -> Option<String> {
        match event {
            EngineEvent::AgentStartedSpeaking => self.notify(LifecycleEvent::AgentStartedSpeaking),
            EngineEvent::AgentStoppedSpeaking => self.notify(LifecycleEvent::AgentStoppedSpeaking),
            EngineEvent::UserStartedSpeaking => self.notify(LifecycleEvent::UserStartedSpeaking),
            EngineEvent::UserStoppedSpeaking => self.notify(LifecycleEvent::UserStoppedSpeaking),
            EngineEvent::Error { message } => {
                warn!(room = %self.room_name, error = %message, "Engine reported an error");
            }
            EngineEvent::Closed => return Some("engine closed".to_string()),
        }
        None
    }

    fn notify(&mut self, event: LifecycleEvent) {
        self.events_observed += 1;
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}

/// Next item from an optional stream; pending forever when there is none
async fn next_event<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::types::DEFAULT_PERSONA_KEY;
    use crate::realtime::{MockEngine, MockEngineConfig};
    use crate::room::{MockRoom, MockRoomConfig};
    use crate::session::{EventRecorder, TurnDetectionPolicy};

    fn orchestrator(
        room: MockRoomConfig,
        engine: MockEngineConfig,
    ) -> SessionOrchestrator<MockRoom, MockEngine> {
        SessionOrchestrator::new(
            SessionSettings::default(),
            Arc::new(PersonaCatalog::bundled().unwrap()),
            MockRoom::new(room),
            MockEngine::new(engine),
        )
    }

    #[tokio::test]
    async fn test_not_json_metadata_reaches_configuring_with_default() {
        let mut session = orchestrator(
            MockRoomConfig::scripted(Some("not-json")),
            MockEngineConfig::default(),
        );

        session.connect("demo").await.unwrap();
        session.await_participant().await.unwrap();
        let context = session.resolve_context().unwrap();

        assert_eq!(context.persona_key, DEFAULT_PERSONA_KEY);
        assert!(context.event_type.is_none());
        assert_eq!(session.state(), SessionState::Configuring);
    }

    #[tokio::test]
    async fn test_connect_is_audio_only() {
        let mut session = orchestrator(MockRoomConfig::default(), MockEngineConfig::default());
        session.connect("demo").await.unwrap();
        assert_eq!(session.room().calls().subscribe, Some(AutoSubscribe::AudioOnly));
        assert_eq!(session.state(), SessionState::AwaitingParticipant);
    }

    #[tokio::test]
    async fn test_greeting_failure_keeps_running() {
        let mut session = orchestrator(
            MockRoomConfig::scripted(None),
            MockEngineConfig {
                fail_greeting: true,
                ..Default::default()
            },
        );

        session.connect("demo").await.unwrap();
        session.await_participant().await.unwrap();
        session.resolve_context().unwrap();
        let spec = session.configure().unwrap();
        session.start_session(&spec).await.unwrap();
        session.issue_greeting().await.unwrap();

        assert_eq!(session.state(), SessionState::Running);
        assert!(session.greeting_error().unwrap().contains("refused"));
        assert_eq!(session.engine().calls().replies, vec![GREETING_INSTRUCTIONS.to_string()]);
    }

    #[tokio::test]
    async fn test_full_run_with_recruiter_context() {
        let recorder = Arc::new(EventRecorder::new());
        let mut session = orchestrator(
            MockRoomConfig::scripted(Some(
                r#"{"persona":"recruiter","eventType":"networking","userRole":"student"}"#,
            )),
            MockEngineConfig::default(),
        )
        .with_observer(recorder.clone());

        let summary = session.run("demo").await.unwrap();

        assert_eq!(summary.final_state, SessionState::Closed);
        assert_eq!(summary.persona_key.as_deref(), Some("recruiter"));
        assert_eq!(summary.participant.as_deref(), Some("practice-user"));
        assert_eq!(summary.end_reason, "participant left");
        assert!(summary.greeting_error.is_none());
        assert_eq!(summary.events_observed, 6);
        assert_eq!(recorder.len(), 6);
        assert!(recorder.events().contains(&LifecycleEvent::UserStoppedSpeaking));

        let spec = session.engine().calls().spec.unwrap();
        assert!(spec.instructions.contains("Event type: networking"));
        assert!(spec.instructions.contains("The person you're talking to is a student"));
        assert_eq!(spec.engine.turn_detection, TurnDetectionPolicy::conservative());
        assert!(spec.input.noise_cancellation);

        assert_eq!(
            session.room().calls().disconnect_reason.as_deref(),
            Some("participant left")
        );
        assert!(session.engine().calls().closed);
    }

    #[tokio::test]
    async fn test_greeting_failure_run_still_closes_cleanly() {
        let mut session = orchestrator(
            MockRoomConfig::scripted(None),
            MockEngineConfig {
                fail_greeting: true,
                ..Default::default()
            },
        );

        let summary = session.run("demo").await.unwrap();
        assert_eq!(summary.final_state, SessionState::Closed);
        assert!(summary.greeting_error.is_some());
        assert!(session.visited().contains(&SessionState::Running));
    }

    #[tokio::test]
    async fn test_start_failure_is_fatal() {
        let mut session = orchestrator(
            MockRoomConfig::scripted(None),
            MockEngineConfig {
                fail_start: true,
                ..Default::default()
            },
        );

        let err = session.run("demo").await.unwrap_err();
        assert!(matches!(err, Error::SessionStart { .. }));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.engine().calls().replies.is_empty());
        assert!(session.room().calls().disconnect_reason.is_some());
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal() {
        let mut session = orchestrator(
            MockRoomConfig {
                fail_connect: true,
                ..Default::default()
            },
            MockEngineConfig::default(),
        );

        let err = session.run("demo").await.unwrap_err();
        assert_eq!(err.exit_code(), 30);
        assert_eq!(
            session.visited(),
            vec![SessionState::Connecting, SessionState::Failed]
        );
    }

    #[tokio::test]
    async fn test_participant_timeout() {
        let mut session = SessionOrchestrator::new(
            SessionSettings {
                participant_timeout: Some(Duration::from_millis(50)),
                ..Default::default()
            },
            Arc::new(PersonaCatalog::bundled().unwrap()),
            MockRoom::new(MockRoomConfig {
                participant: None,
                ..Default::default()
            }),
            MockEngine::default(),
        );

        let err = session.run("demo").await.unwrap_err();
        assert!(matches!(err, Error::ParticipantTimeout { ref room, .. } if room == "demo"));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_shutdown_ends_running_session() {
        let mut room = MockRoomConfig::scripted(Some(r#"{"persona":"investor"}"#));
        room.leave_after = None;
        let mut session = orchestrator(room, MockEngineConfig::default());

        let summary = session
            .run_with_shutdown("demo", tokio::time::sleep(Duration::from_millis(150)))
            .await
            .unwrap();

        assert_eq!(summary.final_state, SessionState::Closed);
        assert_eq!(summary.end_reason, "shutdown requested");
        assert_eq!(summary.persona_key.as_deref(), Some("investor"));
        // The investor waits for the user, but the greeting is still issued
        assert_eq!(session.engine().calls().replies.len(), 1);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = PartnerConfig::default();
        assert!(SessionSettings::from_config(&config).participant_timeout.is_none());

        config.room.participant_timeout_secs = 30;
        config.realtime.voice = "verse".into();
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.participant_timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.voice, "verse");
    }

    #[test]
    fn test_greeting_is_english_statement() {
        assert!(GREETING_INSTRUCTIONS.contains("ENGLISH ONLY"));
        assert!(GREETING_INSTRUCTIONS.contains("1-2 sentences"));
        assert!(GREETING_INSTRUCTIONS.ends_with("You MUST speak in English."));
    }
}
