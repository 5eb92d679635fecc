//! Participant metadata interpretation and the per-session context.

use serde_json::Value;
use tracing::{debug, warn};

use crate::persona::PersonaCatalog;

/// Metadata key naming the requested persona.
pub const PERSONA_KEY: &str = "persona";
/// Metadata key naming the practice event type.
pub const EVENT_TYPE_KEY: &str = "eventType";
/// Metadata key naming the user's role.
pub const USER_ROLE_KEY: &str = "userRole";

/// What the participant asked for, straight from their metadata.
///
/// Every field is optional; empty strings and non-string values count as
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantMetadata {
    pub persona: Option<String>,
    pub event_type: Option<String>,
    pub user_role: Option<String>,
}

impl ParticipantMetadata {
    pub fn is_empty(&self) -> bool {
        self.persona.is_none() && self.event_type.is_none() && self.user_role.is_none()
    }
}

/// Parse raw participant metadata.
///
/// Never fails: a missing document, invalid JSON or a JSON value that is not
/// an object all give an empty result (the latter two with a warning).
pub fn extract_session_context(raw: Option<&str>) -> ParticipantMetadata {
    let raw = match raw.map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            debug!("Participant has no metadata");
            return ParticipantMetadata::default();
        }
    };

    let document: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Failed to parse participant metadata");
            return ParticipantMetadata::default();
        }
    };

    let Value::Object(fields) = document else {
        warn!("Participant metadata is not a JSON object");
        return ParticipantMetadata::default();
    };

    let string_field = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let metadata = ParticipantMetadata {
        persona: string_field(PERSONA_KEY),
        event_type: string_field(EVENT_TYPE_KEY),
        user_role: string_field(USER_ROLE_KEY),
    };
    debug!(metadata = ?metadata, "Parsed participant metadata");
    metadata
}

/// Everything a session needs from the participant, resolved against the
/// catalog. Built once per session and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Catalog key of the persona actually in use
    pub persona_key: String,

    /// Display name of that persona
    pub persona_name: String,

    /// Persona key the participant asked for, if any
    pub requested_persona: Option<String>,

    pub event_type: Option<String>,
    pub user_role: Option<String>,

    /// Final instructions for the engine
    pub system_prompt: String,
}

impl SessionContext {
    /// Resolve parsed metadata against the catalog.
    pub fn resolve(catalog: &PersonaCatalog, metadata: ParticipantMetadata) -> Self {
        let persona = catalog.resolve(metadata.persona.as_deref());
        if let Some(ref requested) = metadata.persona {
            if requested != &persona.key {
                debug!(requested = %requested, persona = %persona.key, "Unknown persona, using default");
            }
        }

        let system_prompt = catalog.build_system_prompt(
            Some(&persona.key),
            metadata.event_type.as_deref(),
            metadata.user_role.as_deref(),
        );

        Self {
            persona_key: persona.key.clone(),
            persona_name: persona.display_name.clone(),
            requested_persona: metadata.persona,
            event_type: metadata.event_type,
            user_role: metadata.user_role,
            system_prompt,
        }
    }

    /// Parse and resolve in one step.
    pub fn from_metadata(catalog: &PersonaCatalog, raw: Option<&str>) -> Self {
        Self::resolve(catalog, extract_session_context(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::types::DEFAULT_PERSONA_KEY;

    #[test]
    fn test_full_metadata() {
        let meta = extract_session_context(Some(
            r#"{"persona":"investor","eventType":"pitch night","userRole":"founder"}"#,
        ));
        assert_eq!(meta.persona.as_deref(), Some("investor"));
        assert_eq!(meta.event_type.as_deref(), Some("pitch night"));
        assert_eq!(meta.user_role.as_deref(), Some("founder"));
    }

    #[test]
    fn test_truncated_json_gives_empty_context() {
        assert!(extract_session_context(Some(r#"{"persona": "inv"#)).is_empty());
    }

    #[test]
    fn test_non_object_gives_empty_context() {
        for raw in ["not-json", "[1, 2]", "\"recruiter\"", "42", "null"] {
            assert!(extract_session_context(Some(raw)).is_empty(), "{}", raw);
        }
    }

    #[test]
    fn test_missing_metadata() {
        assert!(extract_session_context(None).is_empty());
        assert!(extract_session_context(Some("   ")).is_empty());
    }

    #[test]
    fn test_empty_and_non_string_values_are_absent() {
        let meta = extract_session_context(Some(
            r#"{"persona":"","eventType":7,"userRole":"student","extra":"ignored"}"#,
        ));
        assert_eq!(
            meta,
            ParticipantMetadata {
                persona: None,
                event_type: None,
                user_role: Some("student".into()),
            }
        );
    }

    #[test]
    fn test_resolve_unknown_persona_falls_back() {
        let catalog = PersonaCatalog::bundled().unwrap();
        let ctx = SessionContext::from_metadata(&catalog, Some(r#"{"persona":"astronaut"}"#));

        assert_eq!(ctx.persona_key, DEFAULT_PERSONA_KEY);
        assert_eq!(ctx.requested_persona.as_deref(), Some("astronaut"));
        assert_eq!(
            ctx.system_prompt,
            catalog.resolve(None).prompt_template,
            "no context fields means the raw template"
        );
    }

    #[test]
    fn test_resolve_with_context() {
        let catalog = PersonaCatalog::bundled().unwrap();
        let ctx = SessionContext::from_metadata(
            &catalog,
            Some(r#"{"persona":"recruiter","eventType":"networking","userRole":"student"}"#),
        );

        assert_eq!(ctx.persona_key, "recruiter");
        assert_eq!(ctx.persona_name, "Tech Recruiter");
        assert!(ctx.system_prompt.contains("Event type: networking"));
        assert!(ctx
            .system_prompt
            .contains("The person you're talking to is a student"));
    }
}
