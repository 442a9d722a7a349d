//! ---
//! esu_section: "02-trial-engine"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Concurrent trial engine: scheduling, verification, and reporting."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use esu_common::time::format_elapsed;

use crate::error::HarnessError;
use crate::run_log;
use crate::run_log::RunLog;
use crate::runner::{RunStatus, TrialRunner};
use crate::trial::TrialId;
use crate::verifier::{ArtifactVerifier, Verdict};

/// Result of one trial.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// Trial the outcome belongs to.
    pub trial: TrialId,
    /// Whether the trial counts as a pass.
    pub passed: bool,
    /// Wall-clock time spent in the simulation process.
    pub elapsed: Duration,
    /// Why the trial passed or failed.
    pub verdict: Verdict,
}

impl TrialOutcome {
    /// Build an outcome whose pass flag follows the verdict.
    pub fn from_verdict(trial: TrialId, elapsed: Duration, verdict: Verdict) -> Self {
        Self {
            trial,
            passed: verdict.is_pass(),
            elapsed,
            verdict,
        }
    }
}

/// Executes a complete trial. Implemented by [`TrialCoordinator`]; the seam
/// lets the scheduler be driven without launching real processes.
#[async_trait]
pub trait TrialExecutor: Send + Sync {
    /// Run `trial` to completion. Errors are infrastructure failures, never
    /// a lost simulation.
    async fn execute(&self, trial: TrialId) -> Result<TrialOutcome, HarnessError>;
}

/// Runs the simulation for a trial, then verifies its artifact.
#[derive(Debug, Clone)]
pub struct TrialCoordinator {
    runner: TrialRunner,
    verifier: ArtifactVerifier,
    log: Arc<RunLog>,
}

impl TrialCoordinator {
    /// Compose a runner and a verifier.
    pub fn new(runner: TrialRunner, verifier: ArtifactVerifier, log: Arc<RunLog>) -> Self {
        Self {
            runner,
            verifier,
            log,
        }
    }
}

#[async_trait]
impl TrialExecutor for TrialCoordinator {
    async fn execute(&self, trial: TrialId) -> Result<TrialOutcome, HarnessError> {
        let run = self.runner.run(trial).await?;
        let verdict = match run.status {
            RunStatus::TimedOut(limit) => {
                run_log!(
                    self.log,
                    "Trial {} timed out after {}, {} not checked, fail",
                    trial,
                    format_elapsed(limit),
                    self.verifier.artifact_path(trial).display()
                )?;
                Verdict::TimedOut { limit }
            }
            // The artifact is only inspected once the process has been reaped.
            RunStatus::Exited(_) => self.verifier.inspect(trial)?,
        };
        Ok(TrialOutcome::from_verdict(trial, run.elapsed, verdict))
    }
}
