//! Configuration system for the practice partner agent
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PARTNER_* prefix, plus the LIVEKIT_* / OPENAI_* aliases),
//!    including values loaded from `.env.local` and `.env`
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Shown in place of credential values by `config show`.
const REDACTED: &str = "********";

/// Main agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerConfig {
    /// Agent identity
    pub agent: AgentSettings,

    /// Room gateway connection settings
    pub room: RoomSettings,

    /// Realtime engine settings
    pub realtime: RealtimeSettings,

    /// Persona catalog settings
    pub persona: PersonaSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Agent identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Agent name announced when joining a room
    pub name: String,

    /// Participant identity (defaults to `<name>-<hostname>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

/// Room gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    /// Gateway WebSocket URL
    pub url: String,

    /// API key presented to the gateway
    pub api_key: String,

    /// API secret presented to the gateway
    pub api_secret: String,

    /// Connect + join acknowledgement timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// How long to wait for a participant (0 = forever)
    pub participant_timeout_secs: u64,
}

/// Realtime engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// Realtime WebSocket endpoint
    pub url: String,

    /// Model identifier
    pub model: String,

    /// API key for the engine
    pub api_key: String,

    /// Output voice
    pub voice: String,

    /// Connect + session handshake timeout in milliseconds
    pub connect_timeout_ms: u64,
}

/// Persona catalog settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSettings {
    /// Replacement catalog file (bundled personas when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: "practice-partner".to_string(),
            identity: None,
        }
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:7880/agent".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            connect_timeout_ms: 10000,
            participant_timeout_secs: 0,
        }
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime".to_string(),
            model: "gpt-4o-realtime-preview".to_string(),
            api_key: String::new(),
            voice: "alloy".to_string(),
            connect_timeout_ms: 15000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl AgentSettings {
    /// Identity used when joining; falls back to `<name>-<hostname>`.
    pub fn identity(&self) -> String {
        if let Some(ref identity) = self.identity {
            return identity.clone();
        }
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "local".to_string());
        format!("{}-{}", self.name, host)
    }
}

impl PartnerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e.message()),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // An explicit path must exist
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        let search_paths = [
            PathBuf::from("practice-partner.toml"),
            dirs::config_dir()
                .map(|p| p.join("practice-partner").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".practice-partner").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply overrides from the process environment
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// For aliased settings the `PARTNER_*` name wins over the alias.
    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .find(|v| !v.is_empty())
        };
        let flag = |v: String| v.to_lowercase() == "true" || v == "1";

        // Agent settings
        if let Some(val) = get(&["PARTNER_AGENT_NAME"]) {
            self.agent.name = val;
        }

        // Room settings
        if let Some(val) = get(&["PARTNER_ROOM_URL", "LIVEKIT_URL"]) {
            self.room.url = val;
        }
        if let Some(val) = get(&["PARTNER_ROOM_API_KEY", "LIVEKIT_API_KEY"]) {
            self.room.api_key = val;
        }
        if let Some(val) = get(&["PARTNER_ROOM_API_SECRET", "LIVEKIT_API_SECRET"]) {
            self.room.api_secret = val;
        }
        if let Some(val) = get(&["PARTNER_PARTICIPANT_TIMEOUT_SECS"]) {
            if let Ok(n) = val.parse() {
                self.room.participant_timeout_secs = n;
            }
        }

        // Realtime settings
        if let Some(val) = get(&["PARTNER_REALTIME_URL"]) {
            self.realtime.url = val;
        }
        if let Some(val) = get(&["PARTNER_REALTIME_MODEL"]) {
            self.realtime.model = val;
        }
        if let Some(val) = get(&["PARTNER_REALTIME_API_KEY", "OPENAI_API_KEY"]) {
            self.realtime.api_key = val;
        }
        if let Some(val) = get(&["PARTNER_VOICE"]) {
            self.realtime.voice = val;
        }

        // Persona settings
        if let Some(val) = get(&["PARTNER_PERSONA_CATALOG"]) {
            self.persona.catalog_path = Some(val);
        }

        // Logging settings
        if let Some(val) = get(&["PARTNER_LOG_LEVEL"]) {
            self.logging.level = val;
        }
        if let Some(val) = get(&["PARTNER_LOG_FILE"]) {
            self.logging.file = Some(val);
        }
        if let Some(val) = get(&["PARTNER_LOG_JSON"]) {
            self.logging.json_format = flag(val);
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
        if let Some(ref catalog) = self.persona.catalog_path {
            self.persona.catalog_path = Some(expand_path(catalog));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_ws_url("room.url", &self.room.url)?;
        validate_ws_url("realtime.url", &self.realtime.url)?;

        if self.realtime.model.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "realtime.model",
                "realtime.model cannot be empty",
            ));
        }
        if self.realtime.voice.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "realtime.voice",
                "realtime.voice cannot be empty",
            ));
        }
        if self.agent.name.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "agent.name",
                "agent.name cannot be empty",
            ));
        }
        if self.room.connect_timeout_ms == 0 || self.realtime.connect_timeout_ms == 0 {
            return Err(Error::config_field_invalid(
                "connect_timeout_ms",
                "connect_timeout_ms must be greater than 0",
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Check the credentials `run` needs. Values are never logged.
    pub fn validate_credentials(&self) -> Result<()> {
        let required = [
            (&self.room.api_key, "room.api_key (PARTNER_ROOM_API_KEY / LIVEKIT_API_KEY)"),
            (
                &self.room.api_secret,
                "room.api_secret (PARTNER_ROOM_API_SECRET / LIVEKIT_API_SECRET)",
            ),
            (
                &self.realtime.api_key,
                "realtime.api_key (PARTNER_REALTIME_API_KEY / OPENAI_API_KEY)",
            ),
        ];

        for (value, name) in required {
            if value.trim().is_empty() {
                return Err(Error::MissingCredential {
                    name: name.to_string(),
                });
            }
        }

        debug!(
            room_api_key = credential_state(&self.room.api_key),
            room_api_secret = credential_state(&self.room.api_secret),
            realtime_api_key = credential_state(&self.realtime.api_key),
            "Credentials present"
        );
        Ok(())
    }

    /// Copy with credential values masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [
            &mut copy.room.api_key,
            &mut copy.room.api_secret,
            &mut copy.realtime.api_key,
        ] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        copy
    }
}

/// "set" / "not set", for logging credentials without their values
pub fn credential_state(value: &str) -> &'static str {
    if value.is_empty() {
        "not set"
    } else {
        "set"
    }
}

fn validate_ws_url(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::config_field_invalid(
            field,
            format!("{} cannot be empty", field),
        ));
    }
    if !value.starts_with("ws://") && !value.starts_with("wss://") {
        return Err(Error::config_field_invalid(
            field,
            format!("{} must start with ws:// or wss://", field),
        ));
    }
    url::Url::parse(value).map_err(|e| {
        Error::config_field_invalid(field, format!("{} is not a valid URL: {}", field, e))
    })?;
    Ok(())
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".practice-partner")
                .join("config.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# Practice Partner Configuration
#
# Credentials are usually kept out of this file and supplied through
# .env.local / .env or the environment (LIVEKIT_API_KEY, LIVEKIT_API_SECRET,
# OPENAI_API_KEY).

[agent]
# Agent name announced when joining a room
name = "practice-partner"

# Participant identity (defaults to "<name>-<hostname>")
# identity = "practice-partner-1"

[room]
# Room gateway WebSocket URL
url = "ws://localhost:7880/agent"

# Gateway credentials
api_key = ""
api_secret = ""

# Connect + join acknowledgement timeout in milliseconds
connect_timeout_ms = 10000

# Seconds to wait for a participant to join (0 = wait forever)
participant_timeout_secs = 0

[realtime]
# Realtime engine WebSocket endpoint
url = "wss://api.openai.com/v1/realtime"

# Model identifier
model = "gpt-4o-realtime-preview"

# Engine API key
api_key = ""

# Output voice
voice = "alloy"

# Connect + session handshake timeout in milliseconds
connect_timeout_ms = 15000

[persona]
# Replacement persona catalog ([[persona]] tables); bundled personas when unset
# catalog_path = "~/.practice-partner/personas.toml"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.practice-partner/logs/agent.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
