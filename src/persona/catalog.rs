//! Persona catalog: the fixed lookup table from key to persona.
//!
//! Built once at startup (from the bundled TOML files or a replacement
//! catalog file) and shared read-only with every session.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

use super::prompt;
use super::types::{CatalogFile, PersonaDefinition, DEFAULT_PERSONA_KEY};

/// Bundled persona configs, in listing order.
const BUNDLED: &[(&str, &str)] = &[
    (
        "hackathon_contact",
        include_str!("../../config/personas/hackathon_contact.toml"),
    ),
    ("recruiter", include_str!("../../config/personas/recruiter.toml")),
    ("interviewer", include_str!("../../config/personas/interviewer.toml")),
    ("investor", include_str!("../../config/personas/investor.toml")),
    ("peer", include_str!("../../config/personas/peer.toml")),
];

/// Read-only persona lookup table.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: Vec<PersonaDefinition>,
    default_index: usize,
}

impl PersonaCatalog {
    /// Catalog built from the persona files compiled into the binary.
    pub fn bundled() -> Result<Self> {
        let mut personas = Vec::with_capacity(BUNDLED.len());
        for (name, source) in BUNDLED {
            let def: PersonaDefinition = toml::from_str(source).map_err(|e| {
                Error::catalog_invalid(format!("bundled persona '{}': {}", name, e))
            })?;
            personas.push(def);
        }
        Self::from_definitions(personas)
    }

    /// Catalog from a TOML document of `[[persona]]` tables.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(source)
            .map_err(|e| Error::catalog_invalid(format!("parse error: {}", e)))?;
        Self::from_definitions(file.personas)
    }

    /// Catalog from a file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::CatalogNotFound {
                path: path.to_path_buf(),
            });
        }
        let source = fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let catalog = Self::from_toml_str(&source)?;
        info!(
            path = %path.display(),
            personas = catalog.len(),
            "Loaded persona catalog"
        );
        Ok(catalog)
    }

    /// The configured catalog: a replacement file when one is set, else the
    /// bundled personas.
    pub fn load(catalog_path: Option<&str>) -> Result<Self> {
        match catalog_path {
            Some(path) => Self::from_path(&PathBuf::from(path)),
            None => {
                debug!("Using bundled persona catalog");
                Self::bundled()
            }
        }
    }

    /// Validate and index a list of definitions.
    pub fn from_definitions(personas: Vec<PersonaDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for persona in &personas {
            if persona.key.trim().is_empty() {
                return Err(Error::catalog_invalid("persona with empty key"));
            }
            if !seen.insert(persona.key.as_str()) {
                return Err(Error::catalog_invalid(format!(
                    "duplicate persona key '{}'",
                    persona.key
                )));
            }
            if persona.prompt_template.trim().is_empty() {
                return Err(Error::catalog_invalid(format!(
                    "persona '{}' has an empty prompt template",
                    persona.key
                )));
            }
            if persona.language_locked && !persona.has_language_constraint() {
                return Err(Error::catalog_invalid(format!(
                    "persona '{}' is language locked but its template has no language block",
                    persona.key
                )));
            }
        }

        let default_index = personas
            .iter()
            .position(|p| p.key == DEFAULT_PERSONA_KEY)
            .ok_or_else(|| {
                Error::catalog_invalid(format!(
                    "default persona '{}' is missing",
                    DEFAULT_PERSONA_KEY
                ))
            })?;

        Ok(Self {
            personas,
            default_index,
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────

    /// Exact lookup, no fallback.
    pub fn get(&self, key: &str) -> Option<&PersonaDefinition> {
        self.personas.iter().find(|p| p.key == key)
    }

    /// The canonical fallback persona.
    pub fn default_persona(&self) -> &PersonaDefinition {
        &self.personas[self.default_index]
    }

    /// Total lookup: missing, empty or unknown keys give the default persona.
    pub fn resolve(&self, key: Option<&str>) -> &PersonaDefinition {
        key.map(str::trim)
            .filter(|k| !k.is_empty())
            .and_then(|k| self.get(k))
            .unwrap_or_else(|| self.default_persona())
    }

    /// Final instructions for a persona key and optional situational context.
    pub fn build_system_prompt(
        &self,
        key: Option<&str>,
        event_type: Option<&str>,
        user_role: Option<&str>,
    ) -> String {
        prompt::build_system_prompt(self.resolve(key), event_type, user_role)
    }

    /// All personas in catalog order.
    pub fn list(&self) -> &[PersonaDefinition] {
        &self.personas
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::types::Initiation;
    use tempfile::TempDir;

    fn bundled() -> PersonaCatalog {
        PersonaCatalog::bundled().expect("bundled catalog must be valid")
    }

    #[test]
    fn test_bundled_catalog_has_five_personas() {
        let catalog = bundled();
        let keys: Vec<&str> = catalog.list().iter().map(|p| p.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["hackathon_contact", "recruiter", "interviewer", "investor", "peer"]
        );
    }

    #[test]
    fn test_bundled_templates_are_english_only() {
        for persona in bundled().list() {
            assert!(
                persona.has_language_constraint(),
                "{} lacks the language block",
                persona.key
            );
            assert!(persona
                .prompt_template
                .contains("The conversation will be only in English."));
        }
    }

    #[test]
    fn test_unknown_and_empty_keys_fall_back_to_default() {
        let catalog = bundled();
        let explicit = catalog.resolve(Some(DEFAULT_PERSONA_KEY));

        for key in [None, Some(""), Some("   "), Some("ceo"), Some("RECRUITER")] {
            assert_eq!(catalog.resolve(key), explicit, "key {:?}", key);
        }
        assert_eq!(explicit.display_name, "Hackathon Contact");
    }

    #[test]
    fn test_raw_template_without_context() {
        let catalog = bundled();
        for persona in catalog.list() {
            assert_eq!(
                catalog.build_system_prompt(Some(&persona.key), None, None),
                persona.prompt_template
            );
        }
    }

    #[test]
    fn test_recruiter_with_context() {
        let catalog = bundled();
        let prompt = catalog.build_system_prompt(Some("recruiter"), Some("networking"), Some("student"));
        let template = &catalog.resolve(Some("recruiter")).prompt_template;

        assert!(prompt.starts_with(template.as_str()));
        let block = &prompt[template.len()..];
        assert_eq!(
            block,
            "\n\n# Additional Context\n- Event type: networking\n- The person you're talking to is a student"
        );
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let catalog = bundled();
        let a = catalog.build_system_prompt(Some("interviewer"), Some("career fair"), Some("new grad"));
        let b = catalog.build_system_prompt(Some("interviewer"), Some("career fair"), Some("new grad"));
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_investor_waits_for_user() {
        let catalog = bundled();
        let investor = catalog.resolve(Some("investor"));

        assert_eq!(investor.display_name, "Startup Investor");
        assert_eq!(investor.initiation, Initiation::AwaitUser);
        assert!(investor.prompt_template.contains("Do NOT initiate"));
        assert!(!investor.prompt_template.contains("# Initial Behavior"));

        for persona in catalog.list().iter().filter(|p| p.key != "investor") {
            assert_eq!(persona.initiation, Initiation::AgentOpens, "{}", persona.key);
            assert!(persona.prompt_template.contains("# Initial Behavior"));
        }
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut defs = bundled().list().to_vec();
        defs.push(defs[1].clone());
        let err = PersonaCatalog::from_definitions(defs).unwrap_err();
        assert!(err.to_string().contains("duplicate persona key 'recruiter'"));
    }

    #[test]
    fn test_missing_default_rejected() {
        let defs: Vec<_> = bundled()
            .list()
            .iter()
            .filter(|p| p.key != DEFAULT_PERSONA_KEY)
            .cloned()
            .collect();
        assert!(PersonaCatalog::from_definitions(defs).is_err());
    }

    #[test]
    fn test_language_lock_enforced() {
        let source = r##"
[[persona]]
key = "hackathon_contact"
display_name = "Hackathon Contact"
description = "no language block"
prompt_template = "# Role\nYou are at a hackathon."
"##;
        let err = PersonaCatalog::from_toml_str(source).unwrap_err();
        assert!(err.to_string().contains("language locked"));

        let unlocked = source.replace("prompt_template", "language_locked = false\nprompt_template");
        assert!(PersonaCatalog::from_toml_str(&unlocked).is_ok());
    }

    #[test]
    fn test_catalog_from_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("personas.toml");
        fs::write(
            &path,
            r##"
[[persona]]
key = "hackathon_contact"
display_name = "Booth Visitor"
description = "Swapped-in default"
prompt_template = "# Role\nYou visit booths.\n\n# Language\n- English only."
"##,
        )
        .unwrap();

        let catalog = PersonaCatalog::load(path.to_str()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.resolve(Some("recruiter")).display_name, "Booth Visitor");
    }

    #[test]
    fn test_catalog_path_missing() {
        let err = PersonaCatalog::load(Some("/nonexistent/personas.toml")).unwrap_err();
        assert!(matches!(err, Error::CatalogNotFound { .. }));
    }
}
