//! System prompt assembly.
//!
//! The output is the persona template verbatim, optionally followed by one
//! "additional context" block. Same inputs always give the same string.

use super::types::PersonaDefinition;

/// Heading of the appended situational context block.
pub const CONTEXT_HEADING: &str = "# Additional Context";

/// Render the final instructions for `persona`.
///
/// The context block is appended only when at least one of `event_type` /
/// `user_role` is present and non-empty. Event type is always listed first.
pub fn build_system_prompt(
    persona: &PersonaDefinition,
    event_type: Option<&str>,
    user_role: Option<&str>,
) -> String {
    let mut prompt = persona.prompt_template.clone();
    if let Some(block) = context_block(event_type, user_role) {
        prompt.push_str(&block);
    }
    prompt
}

/// The delimited context block, or `None` when there is nothing to add.
pub fn context_block(event_type: Option<&str>, user_role: Option<&str>) -> Option<String> {
    let event_type = non_empty(event_type);
    let user_role = non_empty(user_role);

    if event_type.is_none() && user_role.is_none() {
        return None;
    }

    let mut block = format!("\n\n{}", CONTEXT_HEADING);
    if let Some(event_type) = event_type {
        block.push_str(&format!("\n- Event type: {}", event_type));
    }
    if let Some(user_role) = user_role {
        block.push_str(&format!("\n- The person you're talking to is a {}", user_role));
    }
    Some(block)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
