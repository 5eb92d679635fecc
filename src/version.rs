//! Build metadata embedded by `build.rs`.

use std::fmt;

/// What was compiled, where, and from which revision
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    git_dirty: &'static str,
    pub build_timestamp: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
    pub rustc_version: &'static str,
    pub host: &'static str,
    bundled_personas: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("PARTNER_GIT_HASH"),
            git_branch: env!("PARTNER_GIT_BRANCH"),
            git_dirty: env!("PARTNER_GIT_DIRTY"),
            build_timestamp: env!("PARTNER_BUILD_TIMESTAMP"),
            target: env!("PARTNER_TARGET"),
            profile: env!("PARTNER_PROFILE"),
            rustc_version: env!("PARTNER_RUSTC_VERSION"),
            host: env!("PARTNER_HOST"),
            bundled_personas: env!("PARTNER_BUNDLED_PERSONAS"),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.git_dirty == "true"
    }

    /// Persona keys compiled into the binary, sorted
    pub fn bundled_personas(&self) -> Vec<&'static str> {
        self.bundled_personas
            .split(',')
            .filter(|key| !key.is_empty())
            .collect()
    }

    /// Version plus git hash, e.g. `0.1.0-1a2b3c4d`
    pub fn full_version(&self) -> String {
        let dirty = if self.is_dirty() { "-dirty" } else { "" };
        format!("{}-{}{}", self.version, self.git_hash, dirty)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f)?;
        writeln!(f, "Build Information:")?;
        writeln!(f, "  Version:    {}", self.version)?;
        writeln!(
            f,
            "  Git Hash:   {}{}",
            self.git_hash,
            if self.is_dirty() { " (dirty)" } else { "" }
        )?;
        writeln!(f, "  Git Branch: {}", self.git_branch)?;
        writeln!(f, "  Built:      {} ({}, {})", self.build_timestamp, self.profile, self.target)?;
        writeln!(f, "  Host:       {}", self.host)?;
        writeln!(f, "  Compiler:   {}", self.rustc_version)?;
        writeln!(f, "  Personas:   {}", self.bundled_personas().join(", "))?;
        Ok(())
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo::current()
}

pub fn print_version() {
    print!("{}", build_info());
}
