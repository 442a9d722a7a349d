//! ---
//! esu_section: "02-trial-engine"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Concurrent trial engine: scheduling, verification, and reporting."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use esu_common::config::HarnessConfig;
use esu_common::time::run_prefix_now;
use serde::Serialize;

/// Identity of one trial within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TrialId {
    /// Zero-based iteration index.
    pub iteration: u32,
    /// Zero-based process index within the iteration.
    pub process: u32,
}

impl TrialId {
    /// Construct a trial identity.
    pub fn new(iteration: u32, process: u32) -> Self {
        Self { iteration, process }
    }
}

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.iteration, self.process)
    }
}

/// Timestamp-derived namespace shared by every file a run produces.
///
/// Computed once per run and handed to each component by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunPrefix(Arc<str>);

impl RunPrefix {
    /// Prefix for a run starting now.
    pub fn now() -> Self {
        Self::new(run_prefix_now())
    }

    /// Wrap an explicit prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(Arc::from(prefix.into()))
    }

    /// Borrow the prefix text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Log tag handed to the simulation, `<prefix>_<iteration>_<process>`.
    pub fn tag(&self, trial: TrialId) -> String {
        format!("{}_{}_{}", self.0, trial.iteration, trial.process)
    }
}

impl fmt::Display for RunPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic mapping from trial identities to files on disk.
#[derive(Debug, Clone)]
pub struct TrialLayout {
    prefix: RunPrefix,
    artifact_root: PathBuf,
    artifact_suffix: String,
    output_dir: PathBuf,
}

impl TrialLayout {
    /// Construct a layout from explicit locations.
    pub fn new(
        prefix: RunPrefix,
        artifact_root: impl Into<PathBuf>,
        artifact_suffix: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            prefix,
            artifact_root: artifact_root.into(),
            artifact_suffix: artifact_suffix.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Construct a layout from the harness configuration.
    pub fn from_config(prefix: RunPrefix, config: &HarnessConfig) -> Self {
        Self::new(
            prefix,
            config.artifacts.root.clone(),
            config.artifacts.suffix.clone(),
            config.output.directory.clone(),
        )
    }

    /// Run prefix every path is namespaced with.
    pub fn prefix(&self) -> &RunPrefix {
        &self.prefix
    }

    /// Directory holding the run log and capture files.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Per-trial log tag.
    pub fn tag(&self, trial: TrialId) -> String {
        self.prefix.tag(trial)
    }

    /// Artifact the simulation writes for `trial`.
    pub fn artifact_path(&self, trial: TrialId) -> PathBuf {
        self.artifact_root
            .join(format!("{}_{}", self.tag(trial), self.artifact_suffix))
    }

    /// Captured standard output of `trial`.
    pub fn stdout_path(&self, trial: TrialId) -> PathBuf {
        self.output_dir.join(format!("{}_stdout.log", self.tag(trial)))
    }

    /// Captured standard error of `trial`.
    pub fn stderr_path(&self, trial: TrialId) -> PathBuf {
        self.output_dir.join(format!("{}_stderr.log", self.tag(trial)))
    }

    /// Shared human-readable run log.
    pub fn run_log_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_output.log", self.prefix))
    }

    /// Machine-readable run summary.
    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_summary.json", self.prefix))
    }
}
