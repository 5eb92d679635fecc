//! Error types for the practice partner agent
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Fatal/recoverable classification for the session flow
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,
    MissingCredential = 103,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Transport errors (3xx)
    TransportFailed = 300,
    ConnectionTimeout = 301,
    JoinRejected = 302,
    ConnectionLost = 303,
    ParticipantTimeout = 304,

    // Protocol errors (4xx)
    ProtocolMalformed = 401,
    AuthenticationFailed = 403,

    // Session / engine errors (5xx)
    SessionStartFailed = 500,
    GreetingFailed = 501,
    InvalidTransition = 503,

    // Persona catalog errors (6xx)
    CatalogInvalid = 600,
    CatalogNotFound = 601,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Transport errors
            400..=499 => 40, // Protocol errors
            500..=599 => 50, // Session errors
            600..=699 => 60, // Persona catalog errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// A credential required by `run` is not configured
    #[error("Missing credential: {name}")]
    MissingCredential { name: String },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    // ─────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────

    /// Room transport could not connect
    #[error("Failed to connect to room '{room}' at {url}: {message}")]
    Transport {
        url: String,
        room: String,
        message: String,
    },

    /// Connection timeout
    #[error("Connection to {url} timed out after {timeout_ms}ms")]
    ConnectionTimeout { url: String, timeout_ms: u64 },

    /// The room platform refused the join request
    #[error("Join rejected for room '{room}': {message}")]
    JoinRejected { room: String, message: String },

    /// Connection dropped while in use
    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },

    /// No participant joined within the configured window
    #[error("No participant joined room '{room}' within {timeout_secs}s")]
    ParticipantTimeout { room: String, timeout_secs: u64 },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Malformed message
    #[error("Malformed protocol message: {message}")]
    ProtocolMalformed { message: String },

    /// Authentication failed
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ─────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────

    /// The realtime engine rejected the session configuration
    #[error("Realtime engine rejected session start: {message}")]
    SessionStart { message: String },

    /// The greeting request could not be issued
    #[error("Failed to issue greeting: {message}")]
    Greeting { message: String },

    /// The orchestrator was asked to move backwards
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // ─────────────────────────────────────────────────────────────
    // Persona Catalog Errors
    // ─────────────────────────────────────────────────────────────

    /// Persona catalog failed validation
    #[error("Invalid persona catalog: {reason}")]
    CatalogInvalid { reason: String },

    /// Persona catalog file is missing
    #[error("Persona catalog not found: {path}")]
    CatalogNotFound { path: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::MissingCredential { .. } => ErrorCode::MissingCredential,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::WebSocket(_) => ErrorCode::TransportFailed,

            Error::Transport { .. } => ErrorCode::TransportFailed,
            Error::ConnectionTimeout { .. } => ErrorCode::ConnectionTimeout,
            Error::JoinRejected { .. } => ErrorCode::JoinRejected,
            Error::ConnectionLost { .. } => ErrorCode::ConnectionLost,
            Error::ParticipantTimeout { .. } => ErrorCode::ParticipantTimeout,

            Error::ProtocolMalformed { .. } => ErrorCode::ProtocolMalformed,
            Error::AuthenticationFailed { .. } => ErrorCode::AuthenticationFailed,

            Error::SessionStart { .. } => ErrorCode::SessionStartFailed,
            Error::Greeting { .. } => ErrorCode::GreetingFailed,
            Error::InvalidTransition { .. } => ErrorCode::InvalidTransition,

            Error::CatalogInvalid { .. } => ErrorCode::CatalogInvalid,
            Error::CatalogNotFound { .. } => ErrorCode::CatalogNotFound,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'practice-partner config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'practice-partner config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),
            Error::MissingCredential { .. } => Some(
                "Set the credential in .env.local, the environment, or the [room]/[realtime] config sections."
            ),

            Error::Transport { .. } => Some(
                "Check that the room gateway is running and that [room].url is correct."
            ),
            Error::ConnectionTimeout { .. } => Some(
                "The endpoint did not answer in time. Check network access or raise connect_timeout_ms."
            ),
            Error::JoinRejected { .. } | Error::AuthenticationFailed { .. } => Some(
                "Verify the room API key and secret."
            ),
            Error::ParticipantTimeout { .. } => Some(
                "Nobody joined the room. Set participant_timeout_secs = 0 to wait indefinitely."
            ),

            Error::SessionStart { .. } => Some(
                "Verify the realtime API key, model and voice settings."
            ),

            Error::CatalogInvalid { .. } => Some(
                "Fix the persona catalog file or remove [persona].catalog_path to use the bundled personas."
            ),
            Error::CatalogNotFound { .. } => Some(
                "Check [persona].catalog_path or PARTNER_PERSONA_CATALOG."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a transport error
    pub fn transport(
        url: impl Into<String>,
        room: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Transport {
            url: url.into(),
            room: room.into(),
            message: message.into(),
        }
    }

    /// Create a session start error
    pub fn session_start(message: impl Into<String>) -> Self {
        Error::SessionStart {
            message: message.into(),
        }
    }

    /// Create a catalog validation error
    pub fn catalog_invalid(reason: impl Into<String>) -> Self {
        Error::CatalogInvalid {
            reason: reason.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::TransportFailed.as_str(), "E300");
        assert_eq!(ErrorCode::SessionStartFailed.as_str(), "E500");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::MissingCredential.exit_code(), 10);
        assert_eq!(ErrorCode::IoRead.exit_code(), 20);
        assert_eq!(ErrorCode::ParticipantTimeout.exit_code(), 30);
        assert_eq!(ErrorCode::AuthenticationFailed.exit_code(), 40);
        assert_eq!(ErrorCode::SessionStartFailed.exit_code(), 50);
        assert_eq!(ErrorCode::CatalogInvalid.exit_code(), 60);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_session_failures_map_to_their_groups() {
        assert_eq!(Error::transport("ws://gw", "room-1", "refused").exit_code(), 30);
        assert_eq!(Error::session_start("bad voice").exit_code(), 50);
        assert_eq!(
            Error::ParticipantTimeout {
                room: "room-1".into(),
                timeout_secs: 5
            }
            .exit_code(),
            30
        );
    }

    #[test]
    fn test_greeting_failure_code() {
        let err = Error::Greeting {
            message: "engine busy".into(),
        };
        assert_eq!(err.code(), ErrorCode::GreetingFailed);
        assert_eq!(err.code().as_str(), "E501");
    }

    #[test]
    fn test_error_display() {
        let err = Error::transport("ws://gw.local", "practice-42", "connection refused");
        let text = err.to_string();
        assert!(text.contains("practice-42"));
        assert!(text.contains("ws://gw.local"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_error_suggestions() {
        let err = Error::MissingCredential {
            name: "OPENAI_API_KEY".into(),
        };
        assert!(err.suggestion().unwrap().contains(".env.local"));

        let err = Error::ParticipantTimeout {
            room: "r".into(),
            timeout_secs: 30,
        };
        assert!(err.suggestion().unwrap().contains("participant_timeout_secs"));
    }

    #[test]
    fn test_format_for_terminal() {
        let err = Error::ConfigNotFound {
            path: PathBuf::from("/test/config.toml"),
        };
        let formatted = err.format_for_terminal();

        assert!(formatted.contains("E100"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_log() {
        let err = Error::session_start("voice not supported");
        let formatted = err.format_for_log();

        assert!(formatted.contains("[E500]"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert_eq!(err.code(), ErrorCode::IoNotFound);
    }
}
