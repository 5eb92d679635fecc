//! Common test utilities and fixtures
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Variables that would leak the developer's setup into a test run
const ISOLATED_VARS: &[&str] = &[
    "XDG_CONFIG_HOME",
    "RUST_LOG",
    "PARTNER_CONFIG",
    "PARTNER_ROOM",
    "PARTNER_AGENT_NAME",
    "PARTNER_ROOM_URL",
    "PARTNER_ROOM_API_KEY",
    "PARTNER_ROOM_API_SECRET",
    "PARTNER_PARTICIPANT_TIMEOUT_SECS",
    "PARTNER_REALTIME_URL",
    "PARTNER_REALTIME_MODEL",
    "PARTNER_REALTIME_API_KEY",
    "PARTNER_VOICE",
    "PARTNER_PERSONA_CATALOG",
    "PARTNER_LOG_LEVEL",
    "PARTNER_LOG_FILE",
    "PARTNER_LOG_JSON",
    "LIVEKIT_URL",
    "LIVEKIT_API_KEY",
    "LIVEKIT_API_SECRET",
    "OPENAI_API_KEY",
];

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// A throwaway home and working directory for one binary invocation
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `name` inside the sandbox
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// The binary, running inside the sandbox with a clean environment
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("practice-partner").unwrap();
        cmd.current_dir(self.dir.path()).env("HOME", self.dir.path());
        for var in ISOLATED_VARS {
            cmd.env_remove(var);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_exist() {
        assert!(fixture_path("valid_config.toml").exists());
        assert!(fixture_path("invalid_config.toml").exists());
        assert!(fixture_path("personas.toml").exists());
    }

    #[test]
    fn test_sandbox_write() {
        let sandbox = Sandbox::new();
        let path = sandbox.write("nested/file.txt", "hello");
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }
}
