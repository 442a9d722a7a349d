//! ---
//! esu_section: "02-trial-engine"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Concurrent trial engine: scheduling, verification, and reporting."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::HarnessError;
use crate::run_log;
use crate::run_log::RunLog;
use crate::trial::{TrialId, TrialLayout};

/// Judgement passed on a single trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The marker was found; `line` is the 1-based line of the last occurrence.
    Win {
        /// Artifact that was inspected.
        artifact: PathBuf,
        /// Line holding the marker.
        line: usize,
    },
    /// The simulation never wrote its artifact.
    Missing {
        /// Expected artifact location.
        artifact: PathBuf,
    },
    /// The artifact exists but holds no marker line.
    Inconclusive {
        /// Artifact that was inspected.
        artifact: PathBuf,
    },
    /// The artifact exists but could not be read.
    Unreadable {
        /// Artifact that was inspected.
        artifact: PathBuf,
        /// Reason reported by the filesystem.
        reason: String,
    },
    /// The process was killed before it finished.
    TimedOut {
        /// Limit that was exceeded.
        limit: Duration,
    },
}

impl Verdict {
    /// Whether the trial counts as passed.
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Win { .. })
    }
}

/// Return the index of the last line containing `marker`, scanning from the
/// final line towards the first. Matching is a case-sensitive substring test.
pub fn scan_from_end<'a, I>(lines: I, marker: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
{
    lines
        .into_iter()
        .enumerate()
        .rev()
        .find(|(_, line)| line.contains(marker))
        .map(|(index, _)| index)
}

/// Decides pass/fail for a trial from the artifact the simulation wrote.
#[derive(Debug, Clone)]
pub struct ArtifactVerifier {
    layout: Arc<TrialLayout>,
    marker: String,
    log: Arc<RunLog>,
}

impl ArtifactVerifier {
    /// Create a verifier looking for `marker` in artifacts laid out by `layout`.
    pub fn new(layout: Arc<TrialLayout>, marker: impl Into<String>, log: Arc<RunLog>) -> Self {
        Self {
            layout,
            marker: marker.into(),
            log,
        }
    }

    /// Where the artifact of `trial` is expected.
    pub fn artifact_path(&self, trial: TrialId) -> PathBuf {
        self.layout.artifact_path(trial)
    }

    /// Whether `trial` produced a definitive win.
    pub fn verify(&self, trial: TrialId) -> Result<bool, HarnessError> {
        Ok(self.inspect(trial)?.is_pass())
    }

    /// Inspect the artifact of `trial`. Missing or unreadable artifacts are
    /// trial failures; only a run-log write failure is returned as an error.
    pub fn inspect(&self, trial: TrialId) -> Result<Verdict, HarnessError> {
        let artifact = self.artifact_path(trial);
        run_log!(self.log, "Checking {}...", artifact.display())?;

        if !artifact.is_file() {
            run_log!(self.log, "{} does not exist, fail", artifact.display())?;
            return Ok(Verdict::Missing { artifact });
        }

        // Engines killed mid-write can leave a truncated multi-byte sequence;
        // decode lossily so the marker is still found.
        let bytes = match fs::read(&artifact) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                run_log!(self.log, "{} does not exist, fail", artifact.display())?;
                return Ok(Verdict::Missing { artifact });
            }
            Err(err) => {
                run_log!(
                    self.log,
                    "Could not read {} ({}), fail",
                    artifact.display(),
                    err
                )?;
                return Ok(Verdict::Unreadable {
                    artifact,
                    reason: err.to_string(),
                });
            }
        };

        let contents = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = contents.lines().collect();
        match scan_from_end(lines.iter().copied(), &self.marker) {
            Some(index) => {
                debug!(%trial, line = index + 1, "marker found");
                run_log!(self.log, "Definitive win log for {} exists!", artifact.display())?;
                Ok(Verdict::Win {
                    artifact,
                    line: index + 1,
                })
            }
            None => {
                run_log!(
                    self.log,
                    "Could not find definitive win log for {}",
                    artifact.display()
                )?;
                Ok(Verdict::Inconclusive { artifact })
            }
        }
    }
}
