//! Build script for the practice partner agent
//!
//! Embeds git and toolchain details plus the list of bundled personas so
//! `practice-partner version` can report exactly what was shipped.

use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

const PERSONA_DIR: &str = "config/personas";

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-changed={}", PERSONA_DIR);

    let git_hash = capture("git", &["rev-parse", "--short=8", "HEAD"]);
    let git_branch = capture("git", &["rev-parse", "--abbrev-ref", "HEAD"]);
    let git_dirty = match Command::new("git").args(["status", "--porcelain"]).output() {
        Ok(out) if out.status.success() => (!out.stdout.is_empty()).to_string(),
        _ => "unknown".to_string(),
    };

    let personas = bundled_personas(Path::new(PERSONA_DIR));
    if personas.is_empty() {
        println!("cargo:warning=no bundled personas found in {}", PERSONA_DIR);
    }

    let vars = [
        ("PARTNER_GIT_HASH", git_hash),
        ("PARTNER_GIT_BRANCH", git_branch),
        ("PARTNER_GIT_DIRTY", git_dirty),
        (
            "PARTNER_BUILD_TIMESTAMP",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        ("PARTNER_TARGET", cargo_var("TARGET")),
        ("PARTNER_PROFILE", cargo_var("PROFILE")),
        ("PARTNER_HOST", cargo_var("HOST")),
        ("PARTNER_RUSTC_VERSION", capture("rustc", &["--version"])),
        ("PARTNER_BUNDLED_PERSONAS", personas.join(",")),
    ];
    for (name, value) in vars {
        println!("cargo:rustc-env={}={}", name, value);
    }
}

fn cargo_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| "unknown".to_string())
}

/// Trimmed stdout of a successful command, or "unknown"
fn capture(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Sorted persona keys, one per `*.toml` file
fn bundled_personas(dir: &Path) -> Vec<String> {
    let mut keys: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().map_or(false, |ext| ext == "toml"))
                .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    keys.sort();
    keys
}
