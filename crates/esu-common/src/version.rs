//! ---
//! esu_section: "01-shared-foundation"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Shared primitives and utilities for the trial harness."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::fmt;

/// Compile-time version metadata captured via `vergen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Harness version from the workspace manifest.
    pub semver: String,
    /// When the binary was built, as emitted by `vergen`.
    pub build_timestamp: String,
    /// Target triple the binary was compiled for.
    pub target: String,
    /// Cargo profile the binary was compiled with.
    pub profile: String,
}

impl VersionInfo {
    /// Metadata of the running binary. Fields `vergen` could not capture
    /// read `UNKNOWN`.
    #[must_use]
    pub fn current() -> Self {
        Self {
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            build_timestamp: option_env!("VERGEN_BUILD_TIMESTAMP")
                .unwrap_or("UNKNOWN")
                .to_owned(),
            target: option_env!("VERGEN_CARGO_TARGET_TRIPLE")
                .unwrap_or("UNKNOWN")
                .to_owned(),
            profile: option_env!("VERGEN_CARGO_PROFILE")
                .unwrap_or("UNKNOWN")
                .to_owned(),
        }
    }

    /// Human readable banner used at the top of a run log.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("esu-trials v{}", self.semver)
    }
}

/// Multi-line report printed by `esu-trials -V`.
impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.banner())?;
        writeln!(f, "built:   {}", self.build_timestamp)?;
        writeln!(f, "target:  {}", self.target)?;
        write!(f, "profile: {}", self.profile)
    }
}
