//! ---
//! esu_section: "02-trial-engine"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Concurrent trial engine: scheduling, verification, and reporting."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::trial::TrialId;

/// Infrastructure failures that abort a run.
///
/// A lost trial (missing artifact, no marker, timeout) is not an error; it is
/// reported through [`crate::Verdict`].
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The external simulation process could not be started.
    #[error("failed to launch trial {trial} ({program}): {source}")]
    Launch {
        /// Trial being launched.
        trial: TrialId,
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Waiting on or killing a running trial process failed.
    #[error("lost track of trial {trial} process: {source}")]
    Wait {
        /// Trial whose process could not be awaited.
        trial: TrialId,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// A per-trial stdout/stderr capture file could not be created.
    #[error("failed to create capture file {path}: {source}")]
    Capture {
        /// Capture file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The shared run log could not be written.
    #[error("failed to write run log {path}: {source}")]
    RunLog {
        /// Run log path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The run summary could not be written.
    #[error("failed to write run summary {path}: {source}")]
    Summary {
        /// Summary file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A trial task panicked or was cancelled before producing an outcome.
    #[error("trial task aborted: {0}")]
    TrialAborted(String),
    /// The worker pool was closed while trials were still queued.
    #[error("worker pool closed while trial {0} was waiting for a slot")]
    PoolClosed(TrialId),
}
