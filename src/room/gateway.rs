//! WebSocket client for the room gateway
//!
//! Joins a room over a single WebSocket connection:
//! - Bearer credentials on the upgrade request
//! - JOIN / JOIN_ACK handshake bounded by the connect timeout
//! - A background task that turns gateway messages into participant and
//!   room events
//!
//! There is no reconnection. A dropped connection ends the session.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::PartnerConfig;
use crate::error::{Error, Result};
use crate::protocol::{
    JoinAckResponse, JoinRequest, LeaveMessage, Message, MessageEnvelope, PROTOCOL_VERSION,
};

use super::{AutoSubscribe, RemoteParticipant, RoomBinding, RoomEvent, RoomTransport};

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the gateway client
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// WebSocket URL of the gateway
    pub url: String,

    /// API key
    pub api_key: String,

    /// API secret
    pub api_secret: String,

    /// Participant identity of the agent
    pub identity: String,

    /// Agent name sent with the join
    pub agent_name: String,

    /// Bound on connect + join acknowledgement
    pub connect_timeout: Duration,

    /// Event channel capacity
    pub queue_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:7880/agent".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            identity: "practice-partner".to_string(),
            agent_name: "practice-partner".to_string(),
            connect_timeout: Duration::from_secs(10),
            queue_size: 100,
        }
    }
}

impl GatewayConfig {
    pub fn from_config(config: &PartnerConfig) -> Self {
        Self {
            url: config.room.url.clone(),
            api_key: config.room.api_key.clone(),
            api_secret: config.room.api_secret.clone(),
            identity: config.agent.identity(),
            agent_name: config.agent.name.clone(),
            connect_timeout: Duration::from_millis(config.room.connect_timeout_ms),
            queue_size: 100,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Command Channel
// ─────────────────────────────────────────────────────────────────

/// Commands from the session to the connection task
#[derive(Debug)]
enum GatewayCommand {
    /// Send LEAVE and close the socket
    Leave(String),
}

// ─────────────────────────────────────────────────────────────────
// Gateway Room
// ─────────────────────────────────────────────────────────────────

/// [`RoomTransport`] backed by the room gateway
pub struct GatewayRoom {
    config: GatewayConfig,
    room: Option<String>,
    command_tx: Option<mpsc::Sender<GatewayCommand>>,
    participant_rx: Option<mpsc::Receiver<RemoteParticipant>>,
    event_rx: Option<mpsc::Receiver<RoomEvent>>,
    task: Option<JoinHandle<()>>,
}

impl GatewayRoom {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            room: None,
            command_tx: None,
            participant_rx: None,
            event_rx: None,
            task: None,
        }
    }

    /// Upgrade request carrying the bearer credentials
    fn build_request(
        &self,
        url: &Url,
        room: &str,
    ) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::transport(url.as_str(), room, e.to_string()))?;

        let token = format!("Bearer {}:{}", self.config.api_key, self.config.api_secret);
        let value = HeaderValue::from_str(&token).map_err(|_| {
            Error::config_field_invalid("room.api_key", "credentials contain invalid header characters")
        })?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }
}

#[async_trait]
impl RoomTransport for GatewayRoom {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn connect(&mut self, room: &str, subscribe: AutoSubscribe) -> Result<RoomBinding> {
        let url = Url::parse(&self.config.url)
            .map_err(|e| Error::transport(&self.config.url, room, format!("invalid URL: {}", e)))?;
        let request = self.build_request(&url, room)?;
        let timeout = self.config.connect_timeout;

        info!(url = %url, room = %room, "Connecting to room gateway");

        let (ws_stream, _response) = tokio::time::timeout(timeout, connect_async(request))
            .await
            .map_err(|_| Error::ConnectionTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| connect_error(&url, room, e))?;

        debug!("WebSocket connection established");

        let (mut write, mut read) = ws_stream.split();

        let join = Message::Join(JoinRequest {
            room: room.to_string(),
            identity: self.config.identity.clone(),
            agent_name: self.config.agent_name.clone(),
            auto_subscribe: subscribe,
        });
        send_message(&mut write, join).await?;
        debug!(room = %room, subscribe = ?subscribe, "Sent join request");

        let ack = tokio::time::timeout(timeout, wait_for_join_ack(&mut read, room))
            .await
            .map_err(|_| Error::ConnectionTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })??;

        if !ack.success {
            let message = ack.error.unwrap_or_else(|| "join refused".to_string());
            error!(room = %room, error = %message, "Join rejected");
            return Err(Error::JoinRejected {
                room: room.to_string(),
                message,
            });
        }

        info!(
            room = %room,
            room_sid = ?ack.room_sid,
            participants = ack.participants.len(),
            "Joined room"
        );

        let (command_tx, command_rx) = mpsc::channel(8);
        let (participant_tx, participant_rx) = mpsc::channel(self.config.queue_size);
        let (event_tx, event_rx) = mpsc::channel(self.config.queue_size);

        // Participants already present are queued ahead of later joins
        for participant in ack.participants {
            debug!(participant = %participant.identity, "Participant already in room");
            let _ = participant_tx.try_send(participant);
        }

        self.task = Some(tokio::spawn(async move {
            run_connection(write, read, command_rx, participant_tx, event_tx).await;
        }));
        self.command_tx = Some(command_tx);
        self.participant_rx = Some(participant_rx);
        self.event_rx = Some(event_rx);
        self.room = Some(room.to_string());

        Ok(RoomBinding {
            room: room.to_string(),
            room_sid: ack.room_sid,
            identity: self.config.identity.clone(),
        })
    }

    async fn wait_for_participant(&mut self) -> Result<RemoteParticipant> {
        let rx = self
            .participant_rx
            .as_mut()
            .ok_or_else(|| Error::Internal("wait_for_participant called before connect".into()))?;

        rx.recv().await.ok_or_else(|| Error::ConnectionLost {
            message: "room connection closed before a participant joined".to_string(),
        })
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<RoomEvent>> {
        self.event_rx.take()
    }

    async fn disconnect(&mut self, reason: &str) -> Result<()> {
        if let Some(tx) = self.command_tx.take() {
            // A closed channel means the connection already ended
            let _ = tx.send(GatewayCommand::Leave(reason.to_string())).await;
        }
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                warn!("Gateway connection did not close in time");
            }
        }
        if let Some(room) = self.room.take() {
            info!(room = %room, reason = %reason, "Left room");
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Connection Loop
// ─────────────────────────────────────────────────────────────────

/// Map a failed upgrade to the matching error
fn connect_error(url: &Url, room: &str, err: WsError) -> Error {
    match err {
        WsError::Http(ref response)
            if response.status().as_u16() == 401 || response.status().as_u16() == 403 =>
        {
            Error::AuthenticationFailed {
                message: format!("gateway answered {}", response.status()),
            }
        }
        other => Error::transport(url.as_str(), room, other.to_string()),
    }
}

/// Wait for the join acknowledgment
async fn wait_for_join_ack<R>(read: &mut R, room: &str) -> Result<JoinAckResponse>
where
    R: StreamExt<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        let envelope = match msg {
            Ok(WsMessage::Text(text)) => MessageEnvelope::from_json(&text),
            Ok(WsMessage::Binary(data)) => MessageEnvelope::from_json_bytes(&data),
            Ok(WsMessage::Close(_)) => {
                return Err(Error::ConnectionLost {
                    message: "connection closed during join".to_string(),
                });
            }
            Ok(_) => continue,
            Err(e) => {
                return Err(Error::ConnectionLost {
                    message: e.to_string(),
                });
            }
        };

        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Failed to parse message during join");
                continue;
            }
        };

        if !PROTOCOL_VERSION.is_compatible_with(&envelope.version) {
            warn!(
                ours = %PROTOCOL_VERSION,
                theirs = %envelope.version,
                "Gateway protocol version may be incompatible"
            );
        }

        match envelope.payload {
            Message::JoinAck(ack) => return Ok(ack),
            Message::Error(err) => {
                return Err(Error::JoinRejected {
                    room: room.to_string(),
                    message: format!("{}: {}", err.code, err.message),
                });
            }
            other => {
                debug!(message_type = other.type_name(), "Ignoring message before join ack");
            }
        }
    }

    Err(Error::ConnectionLost {
        message: "stream ended during join".to_string(),
    })
}

/// Pump an established connection until it closes or the session leaves
async fn run_connection<S, R>(
    mut write: S,
    mut read: R,
    mut command_rx: mpsc::Receiver<GatewayCommand>,
    participant_tx: mpsc::Sender<RemoteParticipant>,
    event_tx: mpsc::Sender<RoomEvent>,
) where
    S: SinkExt<WsMessage, Error = WsError> + Unpin,
    R: StreamExt<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    let reason = loop {
        tokio::select! {
            msg = read.next() => {
                let envelope = match msg {
                    Some(Ok(WsMessage::Text(text))) => MessageEnvelope::from_json(&text),
                    Some(Ok(WsMessage::Binary(data))) => MessageEnvelope::from_json_bytes(&data),
                    Some(Ok(WsMessage::Ping(data))) => {
                        if let Err(e) = write.send(WsMessage::Pong(data)).await {
                            break format!("failed to answer ping: {}", e);
                        }
                        continue;
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(frame = ?frame, "Gateway closed the connection");
                        break "closed by gateway".to_string();
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break e.to_string();
                    }
                    None => break "stream ended".to_string(),
                };

                match envelope {
                    Ok(envelope) => {
                        if let Some(reason) =
                            handle_incoming_message(envelope, &participant_tx, &event_tx).await
                        {
                            break reason;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to parse gateway message"),
                }
            }

            cmd = command_rx.recv() => {
                match cmd {
                    Some(GatewayCommand::Leave(reason)) => {
                        let leave = Message::Leave(LeaveMessage { reason: reason.clone() });
                        if let Err(e) = send_message(&mut write, leave).await {
                            debug!(error = %e, "Failed to send leave");
                        }
                        let _ = write.send(WsMessage::Close(None)).await;
                        return;
                    }
                    None => break "session dropped the room".to_string(),
                }
            }
        }
    };

    let _ = event_tx.send(RoomEvent::Disconnected { reason }).await;
    debug!("Gateway connection loop terminated");
}

/// Dispatch one gateway message. Returns a reason when the connection is over.
async fn handle_incoming_message(
    envelope: MessageEnvelope,
    participant_tx: &mpsc::Sender<RemoteParticipant>,
    event_tx: &mpsc::Sender<RoomEvent>,
) -> Option<String> {
    debug!(message_type = envelope.payload.type_name(), "Received message");

    match envelope.payload {
        Message::ParticipantJoined(joined) => {
            info!(participant = %joined.participant.identity, "Participant joined");
            // Only the first participant is consumed; later joins may be dropped
            let _ = participant_tx.try_send(joined.participant);
        }
        Message::ParticipantLeft(left) => {
            info!(participant = %left.identity, "Participant left");
            let _ = event_tx
                .send(RoomEvent::ParticipantLeft {
                    identity: left.identity,
                })
                .await;
        }
        Message::TrackPublished(track) => {
            let _ = event_tx
                .send(RoomEvent::TrackPublished {
                    participant: track.participant,
                    kind: track.kind,
                    track_sid: track.track_sid,
                })
                .await;
        }
        Message::TrackSubscribed(track) => {
            let _ = event_tx
                .send(RoomEvent::TrackSubscribed {
                    participant: track.participant,
                    kind: track.kind,
                    track_sid: track.track_sid,
                })
                .await;
        }
        Message::Error(err) => {
            if err.fatal {
                error!(code = %err.code, message = %err.message, "Fatal gateway error");
                return Some(format!("{}: {}", err.code, err.message));
            }
            warn!(code = %err.code, message = %err.message, "Gateway error");
        }
        other => {
            debug!(message_type = other.type_name(), "Unhandled message type");
        }
    }

    None
}

/// Send a protocol message
async fn send_message<S>(write: &mut S, msg: Message) -> Result<()>
where
    S: SinkExt<WsMessage, Error = WsError> + Unpin,
{
    let json = MessageEnvelope::new(msg)
        .to_json()
        .map_err(|e| Error::ProtocolMalformed {
            message: e.to_string(),
        })?;
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
