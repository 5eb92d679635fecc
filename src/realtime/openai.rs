//! WebSocket client for an OpenAI Realtime compatible engine
//!
//! Session start is a three-step handshake:
//! 1. wait for `session.created`
//! 2. send `session.update` with instructions, voice and turn detection
//! 3. wait for `session.updated` (an `error` here rejects the session)
//!
//! Afterwards a background task forwards speaking signals to the session
//! and writes greeting requests. A greeting counts as issued once the
//! engine answers with `response.created` (or a non-failed
//! `response.done`); an `error` or a failed response before that is a
//! greeting failure.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        handshake::client::Request,
        http::{header::AUTHORIZATION, HeaderValue},
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::PartnerConfig;
use crate::error::{Error, Result};
use crate::room::RoomBinding;

use super::events::{ClientEvent, ResponseCreate, ServerEvent, SessionUpdate};
use super::{AgentSpec, EngineEvent, RealtimeEngine};

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "realtime=v1";

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the realtime client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// WebSocket endpoint, without the model query
    pub url: String,

    pub api_key: String,

    /// Bound on connect and on each handshake step
    pub connect_timeout: Duration,

    /// How long a greeting may wait for the engine to acknowledge it
    pub reply_timeout: Duration,

    /// Event channel capacity
    pub queue_size: usize,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime".to_string(),
            api_key: String::new(),
            connect_timeout: Duration::from_secs(15),
            reply_timeout: Duration::from_secs(10),
            queue_size: 100,
        }
    }
}

impl OpenAiConfig {
    pub fn from_config(config: &PartnerConfig) -> Self {
        Self {
            url: config.realtime.url.clone(),
            api_key: config.realtime.api_key.clone(),
            connect_timeout: Duration::from_millis(config.realtime.connect_timeout_ms),
            reply_timeout: Duration::from_millis(config.realtime.connect_timeout_ms),
            queue_size: 100,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Command Channel
// ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum EngineCommand {
    /// Send `response.create`; `done` resolves when the engine answers
    GenerateReply {
        instructions: String,
        done: oneshot::Sender<Result<()>>,
    },

    /// Close the socket
    Close,
}

// ─────────────────────────────────────────────────────────────────
// OpenAI Realtime Engine
// ─────────────────────────────────────────────────────────────────

/// [`RealtimeEngine`] speaking the OpenAI Realtime protocol
pub struct OpenAiRealtimeEngine {
    config: OpenAiConfig,
    command_tx: Option<mpsc::Sender<EngineCommand>>,
    task: Option<JoinHandle<()>>,
}

impl OpenAiRealtimeEngine {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            command_tx: None,
            task: None,
        }
    }

    /// `{url}?model={model}`
    fn endpoint(&self, model: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.url).map_err(|e| {
            Error::config_field_invalid("realtime.url", format!("invalid URL: {}", e))
        })?;
        url.query_pairs_mut().append_pair("model", model);
        Ok(url)
    }

    fn build_request(&self, url: &Url) -> Result<Request> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::session_start(e.to_string()))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| {
                Error::config_field_invalid(
                    "realtime.api_key",
                    "API key contains invalid header characters",
                )
            })?;
        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(BETA_HEADER, HeaderValue::from_static(BETA_VALUE));
        Ok(request)
    }
}

#[async_trait]
impl RealtimeEngine for OpenAiRealtimeEngine {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn start(
        &mut self,
        spec: &AgentSpec,
        room: &RoomBinding,
    ) -> Result<mpsc::Receiver<EngineEvent>> {
        let url = self.endpoint(&spec.engine.model)?;
        let request = self.build_request(&url)?;
        let timeout = self.config.connect_timeout;
        let timed_out = |step: &str| {
            Error::session_start(format!(
                "no answer from {} while {} within {}ms",
                url,
                step,
                timeout.as_millis()
            ))
        };

        info!(
            room = %room.room,
            model = %spec.engine.model,
            voice = %spec.engine.voice,
            "Starting realtime session"
        );

        let (ws_stream, _response) = tokio::time::timeout(timeout, connect_async(request))
            .await
            .map_err(|_| timed_out("connecting"))?
            .map_err(connect_error)?;

        let (mut write, mut read) = ws_stream.split();

        let created = tokio::time::timeout(timeout, wait_for_session(&mut read, "session.created"))
            .await
            .map_err(|_| timed_out("waiting for session.created"))??;
        debug!(session = %created, "Realtime session created");

        let update = ClientEvent::SessionUpdate {
            session: SessionUpdate::from(spec),
        };
        send_event(&mut write, &update)
            .await
            .map_err(|e| Error::session_start(e.to_string()))?;

        tokio::time::timeout(timeout, wait_for_session(&mut read, "session.updated"))
            .await
            .map_err(|_| timed_out("waiting for session.updated"))??;

        info!(
            room = %room.room,
            threshold = spec.engine.turn_detection.sensitivity_threshold,
            silence_ms = spec.engine.turn_detection.silence_duration_ms,
            "Realtime session configured"
        );

        let (command_tx, command_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(self.config.queue_size);

        self.task = Some(tokio::spawn(async move {
            run_engine(write, read, command_rx, event_tx).await;
        }));
        self.command_tx = Some(command_tx);

        Ok(event_rx)
    }

    async fn generate_reply(&mut self, instructions: &str) -> Result<()> {
        let tx = self.command_tx.as_ref().ok_or_else(|| Error::Greeting {
            message: "engine session not started".to_string(),
        })?;

        let (done_tx, done_rx) = oneshot::channel();
        tx.send(EngineCommand::GenerateReply {
            instructions: instructions.to_string(),
            done: done_tx,
        })
        .await
        .map_err(|_| Error::Greeting {
            message: "engine connection closed".to_string(),
        })?;

        let timeout = self.config.reply_timeout;
        match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Greeting {
                message: "engine connection closed".to_string(),
            }),
            Err(_) => Err(Error::Greeting {
                message: format!(
                    "engine did not acknowledge the greeting within {}ms",
                    timeout.as_millis()
                ),
            }),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(EngineCommand::Close).await;
        }
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                warn!("Realtime connection did not close in time");
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Handshake
// ─────────────────────────────────────────────────────────────────

fn connect_error(err: WsError) -> Error {
    match err {
        WsError::Http(ref response)
            if response.status().as_u16() == 401 || response.status().as_u16() == 403 =>
        {
            Error::AuthenticationFailed {
                message: format!("realtime engine answered {}", response.status()),
            }
        }
        other => Error::session_start(format!("could not reach realtime engine: {}", other)),
    }
}

/// Wait for `session.created` or `session.updated`; returns the session body
async fn wait_for_session<R>(read: &mut R, expected: &str) -> Result<serde_json::Value>
where
    R: StreamExt<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        let event: ServerEvent = match msg {
            Ok(WsMessage::Text(text)) => match serde_json::from_str(&text) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Failed to parse realtime event during handshake");
                    continue;
                }
            },
            Ok(WsMessage::Close(frame)) => {
                return Err(Error::session_start(format!(
                    "engine closed the connection during handshake ({:?})",
                    frame
                )));
            }
            Ok(_) => continue,
            Err(e) => return Err(Error::session_start(e.to_string())),
        };

        match (expected, event) {
            ("session.created", ServerEvent::SessionCreated { session })
            | ("session.updated", ServerEvent::SessionUpdated { session }) => return Ok(session),
            (_, ServerEvent::Error { error }) => {
                error!(error = %error, "Realtime engine rejected the session");
                return Err(Error::session_start(error.to_string()));
            }
            (_, other) => debug!(event = ?other, expected, "Ignoring event during handshake"),
        }
    }

    Err(Error::session_start(format!(
        "stream ended while waiting for {}",
        expected
    )))
}

// ─────────────────────────────────────────────────────────────────
// Event Loop
// ─────────────────────────────────────────────────────────────────

async fn run_engine<S, R>(
    mut write: S,
    mut read: R,
    mut command_rx: mpsc::Receiver<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
) where
    S: SinkExt<WsMessage, Error = WsError> + Unpin,
    R: StreamExt<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    let mut speaking = SpeakingTracker::default();
    let mut pending_reply: Option<oneshot::Sender<Result<()>>> = None;

    loop {
        tokio::select! {
            msg = read.next() => {
                let event: ServerEvent = match msg {
                    Some(Ok(WsMessage::Text(text))) => match serde_json::from_str(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(error = %e, "Failed to parse realtime event");
                            continue;
                        }
                    },
                    Some(Ok(WsMessage::Ping(data))) => {
                        if write.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(frame = ?frame, "Realtime engine closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!(error = %e, "Realtime WebSocket error");
                        break;
                    }
                    None => break,
                };

                if let Some(outcome) = reply_outcome(&event) {
                    if let Some(done) = pending_reply.take() {
                        let _ = done.send(outcome);
                    }
                }

                if let Some(mapped) = speaking.map(event) {
                    if event_tx.send(mapped).await.is_err() {
                        // Session stopped listening
                        return;
                    }
                }
            }

            cmd = command_rx.recv() => {
                match cmd {
                    Some(EngineCommand::GenerateReply { instructions, done }) => {
                        let event = ClientEvent::ResponseCreate {
                            response: ResponseCreate { instructions },
                        };
                        match send_event(&mut write, &event).await {
                            Ok(()) => pending_reply = Some(done),
                            Err(e) => {
                                let _ = done.send(Err(Error::Greeting { message: e.to_string() }));
                            }
                        }
                    }
                    Some(EngineCommand::Close) | None => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        return;
                    }
                }
            }
        }
    }

    let _ = event_tx.send(EngineEvent::Closed).await;
    debug!("Realtime event loop terminated");
}

/// How a server event settles an outstanding `response.create`, if it does
fn reply_outcome(event: &ServerEvent) -> Option<Result<()>> {
    match event {
        ServerEvent::ResponseCreated { response } => {
            debug!(response_id = %response.id, "Greeting accepted");
            Some(Ok(()))
        }
        ServerEvent::ResponseDone { response } if response.is_failed() => {
            Some(Err(Error::Greeting {
                message: response.failure_reason(),
            }))
        }
        ServerEvent::ResponseDone { .. } => Some(Ok(())),
        ServerEvent::Error { error } => Some(Err(Error::Greeting {
            message: error.to_string(),
        })),
        _ => None,
    }
}

/// Turns audio deltas into one started/stopped pair per response
#[derive(Debug, Default)]
struct SpeakingTracker {
    current_response: Option<String>,
}

impl SpeakingTracker {
    fn map(&mut self, event: ServerEvent) -> Option<EngineEvent> {
        match event {
            ServerEvent::SpeechStarted => Some(EngineEvent::UserStartedSpeaking),
            ServerEvent::SpeechStopped => Some(EngineEvent::UserStoppedSpeaking),
            ServerEvent::ResponseAudioDelta { response_id } => {
                if self.current_response.as_deref() == Some(response_id.as_str()) {
                    return None;
                }
                self.current_response = Some(response_id);
                Some(EngineEvent::AgentStartedSpeaking)
            }
            ServerEvent::ResponseAudioDone { .. } => {
                self.current_response
                    .take()
                    .map(|_| EngineEvent::AgentStoppedSpeaking)
            }
            ServerEvent::Error { error } => {
                warn!(error = %error, "Realtime engine error");
                Some(EngineEvent::Error {
                    message: error.to_string(),
                })
            }
            ServerEvent::SessionCreated { .. }
            | ServerEvent::SessionUpdated { .. }
            | ServerEvent::ResponseCreated { .. }
            | ServerEvent::ResponseDone { .. }
            | ServerEvent::Other => None,
        }
    }
}

async fn send_event<S>(write: &mut S, event: &ClientEvent) -> Result<()>
where
    S: SinkExt<WsMessage, Error = WsError> + Unpin,
{
    let json = serde_json::to_string(event).map_err(|e| Error::ProtocolMalformed {
        message: e.to_string(),
    })?;
    debug!(event = event.type_name(), "Sending realtime event");
    write
        .send(WsMessage::Text(json))
        .await
        .map_err(|e| Error::ConnectionLost {
            message: e.to_string(),
        })
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
