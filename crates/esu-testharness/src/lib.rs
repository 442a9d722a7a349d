//! ---
//! esu_section: "02-trial-engine"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Concurrent trial engine: scheduling, verification, and reporting."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
//! The trial engine launches headless simulation processes in bounded-parallel
//! iterations, judges each trial from the artifact the simulation leaves
//! behind, and aggregates the results of a whole run.
//!
//! Components, leaves first:
//! [`ArtifactVerifier`] and [`TrialRunner`] handle one trial each,
//! [`TrialCoordinator`] composes them, [`IterationScheduler`] fans a batch of
//! trials out over a bounded pool, and [`RunController`] drives iterations in
//! sequence. Every component writes human-readable status through a shared
//! [`RunLog`].
#![warn(missing_docs)]

pub mod controller;
pub mod coordinator;
pub mod error;
pub mod run_log;
pub mod runner;
pub mod scheduler;
pub mod trial;
pub mod verifier;

pub use controller::{IterationSummary, RunController, RunResult};
pub use coordinator::{TrialCoordinator, TrialExecutor, TrialOutcome};
pub use error::HarnessError;
pub use run_log::RunLog;
pub use runner::{LaunchTemplate, RunStatus, TrialRun, TrialRunner};
pub use scheduler::{IterationResult, IterationScheduler, DEFAULT_MAX_PARALLEL};
pub use trial::{RunPrefix, TrialId, TrialLayout};
pub use verifier::{scan_from_end, ArtifactVerifier, Verdict};
