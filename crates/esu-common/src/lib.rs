//! ---
//! esu_section: "01-shared-foundation"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Shared primitives and utilities for the trial harness."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
//! Shared primitives for the ESU trial harness workspace.
//! This crate exposes configuration loading, tracing initialisation, time
//! formatting, and version metadata consumed by the engine and the CLI.

pub mod config;
pub mod logging;
pub mod time;
pub mod version;

pub use config::{
    ArtifactConfig, HarnessConfig, LaunchConfig, LoadedHarnessConfig, LoggingConfig,
    OutputConfig, SchedulerConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use time::{format_elapsed, run_prefix_now};
pub use version::VersionInfo;
