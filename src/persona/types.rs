//! Core types for the persona catalog.
//!
//! A persona is content, not behaviour: every persona is the same record
//! shape and differs only in the instructions handed to the realtime engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Key of the persona used when a session asks for nothing, or for
/// something the catalog does not know.
pub const DEFAULT_PERSONA_KEY: &str = "hackathon_contact";

/// Heading that opens the English-only block inside a template.
pub const LANGUAGE_HEADING: &str = "# Language";

// ─────────────────────────────────────────────────────────────────
// Initiation
// ─────────────────────────────────────────────────────────────────

/// Who opens the conversation once the session is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Initiation {
    /// The agent opens with a question (hackathon contact, recruiter, ...).
    AgentOpens,
    /// The agent must not self-initiate and waits for the human.
    AwaitUser,
}

impl Default for Initiation {
    fn default() -> Self {
        Initiation::AgentOpens
    }
}

impl fmt::Display for Initiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initiation::AgentOpens => write!(f, "agent opens"),
            Initiation::AwaitUser => write!(f, "waits for user"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona Definition
// ─────────────────────────────────────────────────────────────────

/// One catalog entry, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaDefinition {
    /// Stable identifier, unique within the catalog (e.g. "recruiter").
    pub key: String,

    /// Human-readable label (e.g. "Tech Recruiter").
    pub display_name: String,

    /// One-line summary.
    pub description: String,

    /// Who speaks first.
    #[serde(default)]
    pub initiation: Initiation,

    /// Whether the template must carry the English-only block.
    #[serde(default = "default_language_locked")]
    pub language_locked: bool,

    /// Instruction text handed verbatim to the engine.
    pub prompt_template: String,
}

fn default_language_locked() -> bool {
    true
}

impl PersonaDefinition {
    /// Whether the template carries the English-only block.
    pub fn has_language_constraint(&self) -> bool {
        self.prompt_template.contains(LANGUAGE_HEADING)
    }
}

impl fmt::Display for PersonaDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.key)
    }
}

/// A standalone catalog file: a list of `[[persona]]` tables.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogFile {
    #[serde(rename = "persona", default)]
    pub personas: Vec<PersonaDefinition>,
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiation_serde() {
        let json = serde_json::to_string(&Initiation::AwaitUser).unwrap();
        assert_eq!(json, "\"await-user\"");
        let parsed: Initiation = serde_json::from_str("\"agent-opens\"").unwrap();
        assert_eq!(parsed, Initiation::AgentOpens);
    }

    #[test]
    fn test_definition_defaults() {
        let def: PersonaDefinition = toml::from_str(
            r##"
key = "mentor"
display_name = "Mentor"
description = "Senior engineer offering advice"
prompt_template = "# Role\nYou are a mentor."
"##,
        )
        .unwrap();

        assert_eq!(def.initiation, Initiation::AgentOpens);
        assert!(def.language_locked);
        assert!(!def.has_language_constraint());
    }

    #[test]
    fn test_catalog_file_parse() {
        let file: CatalogFile = toml::from_str(
            r##"
[[persona]]
key = "a"
display_name = "A"
description = "first"
prompt_template = "# Role\nA"

[[persona]]
key = "b"
display_name = "B"
description = "second"
initiation = "await-user"
language_locked = false
prompt_template = "# Role\nB"
"##,
        )
        .unwrap();

        assert_eq!(file.personas.len(), 2);
        assert_eq!(file.personas[1].initiation, Initiation::AwaitUser);
        assert!(!file.personas[1].language_locked);
    }

    #[test]
    fn test_display() {
        let def = PersonaDefinition {
            key: "peer".into(),
            display_name: "Fellow Developer".into(),
            description: "Another developer".into(),
            initiation: Initiation::AgentOpens,
            language_locked: true,
            prompt_template: String::new(),
        };
        assert_eq!(def.to_string(), "Fellow Developer (peer)");
    }
}
