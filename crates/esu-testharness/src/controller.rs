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
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use esu_common::config::HarnessConfig;
use esu_common::time::format_elapsed;
use serde::Serialize;
use tracing::info;

use crate::coordinator::TrialCoordinator;
use crate::error::HarnessError;
use crate::run_log;
use crate::run_log::RunLog;
use crate::runner::{LaunchTemplate, TrialRunner};
use crate::scheduler::{IterationResult, IterationScheduler};
use crate::trial::{RunPrefix, TrialLayout};
use crate::verifier::ArtifactVerifier;

/// Per-iteration entry of a [`RunResult`].
#[derive(Debug, Clone, Serialize)]
pub struct IterationSummary {
    /// Iteration index.
    pub iteration: u32,
    /// Trials run in the iteration.
    pub trials: u32,
    /// Trials that did not pass.
    pub failures: u32,
    /// Wall-clock duration of the iteration in seconds.
    pub elapsed_secs: f64,
}

impl From<&IterationResult> for IterationSummary {
    fn from(result: &IterationResult) -> Self {
        Self {
            iteration: result.iteration,
            trials: result.submitted,
            failures: result.failures,
            elapsed_secs: result.elapsed.as_secs_f64(),
        }
    }
}

/// Terminal result of a run; also written as `<prefix>_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Run prefix namespacing every output file.
    pub prefix: String,
    /// Iterations executed.
    pub iterations: u32,
    /// Trials per iteration.
    pub processes_per_iteration: u32,
    /// Trials executed across all iterations.
    pub total_trials: u64,
    /// Failed trials across all iterations.
    pub total_failures: u64,
    /// Wall-clock duration of the run in seconds.
    pub elapsed_secs: f64,
    /// Per-iteration breakdown in execution order.
    pub per_iteration: Vec<IterationSummary>,
}

/// Drives the iterations of a run one after another.
#[derive(Debug)]
pub struct RunController {
    scheduler: IterationScheduler,
    layout: Arc<TrialLayout>,
    log: Arc<RunLog>,
}

impl RunController {
    /// Assemble a controller from pre-built parts. `layout` fixes the run
    /// prefix for the whole run.
    pub fn new(scheduler: IterationScheduler, layout: Arc<TrialLayout>, log: Arc<RunLog>) -> Self {
        Self {
            scheduler,
            layout,
            log,
        }
    }

    /// Build the full trial pipeline for a run starting now.
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::with_prefix(config, RunPrefix::now())
    }

    /// Build the full trial pipeline under an explicit run prefix.
    pub fn with_prefix(config: &HarnessConfig, prefix: RunPrefix) -> Self {
        let layout = Arc::new(TrialLayout::from_config(prefix, config));
        let log = Arc::new(RunLog::new(layout.run_log_path()));
        let runner = TrialRunner::new(
            Arc::new(LaunchTemplate::from_config(&config.launch)),
            layout.clone(),
            config.scheduler.trial_timeout,
            log.clone(),
        );
        let verifier =
            ArtifactVerifier::new(layout.clone(), config.artifacts.marker.clone(), log.clone());
        let coordinator = TrialCoordinator::new(runner, verifier, log.clone());
        let scheduler = IterationScheduler::new(
            Arc::new(coordinator),
            config.scheduler.max_parallel,
            log.clone(),
        );
        Self::new(scheduler, layout, log)
    }

    /// Prefix shared by every file of this run.
    pub fn prefix(&self) -> &RunPrefix {
        self.layout.prefix()
    }

    /// Shared run log.
    pub fn log(&self) -> &Arc<RunLog> {
        &self.log
    }

    /// Run `iterations` iterations of `processes` trials each and report the
    /// aggregate. Iteration `k + 1` starts only after every trial of
    /// iteration `k` has been collected.
    pub async fn run_all(
        &self,
        iterations: u32,
        processes: u32,
    ) -> Result<RunResult, HarnessError> {
        let started = Instant::now();
        run_log!(
            self.log,
            "Run {}: {} iteration(s) of {} process(es), at most {} at once",
            self.prefix(),
            iterations,
            processes,
            self.scheduler.max_parallel()
        )?;

        let mut per_iteration = Vec::with_capacity(iterations as usize);
        let mut total_failures = 0u64;
        for iteration in 0..iterations {
            run_log!(self.log, "Starting iteration {}", iteration)?;
            let result = self.scheduler.run_iteration(iteration, processes).await?;
            total_failures += u64::from(result.failures);
            run_log!(
                self.log,
                "Iteration {} complete: {} failures out of {} runs in {}",
                iteration,
                result.failures,
                result.submitted,
                format_elapsed(result.elapsed)
            )?;
            info!(
                prefix = %self.prefix(),
                iteration,
                failures = result.failures,
                seconds = result.elapsed.as_secs_f64(),
                "iteration completed"
            );
            per_iteration.push(IterationSummary::from(&result));
        }

        let elapsed = started.elapsed();
        let total_trials = u64::from(iterations) * u64::from(processes);
        run_log!(
            self.log,
            "{} failures out of {} runs.",
            total_failures,
            total_trials
        )?;
        for summary in &per_iteration {
            run_log!(
                self.log,
                "  iteration {}: {}",
                summary.iteration,
                format_elapsed(Duration::from_secs_f64(summary.elapsed_secs))
            )?;
        }
        run_log!(self.log, "Total elapsed: {}", format_elapsed(elapsed))?;

        let result = RunResult {
            prefix: self.prefix().to_string(),
            iterations,
            processes_per_iteration: processes,
            total_trials,
            total_failures,
            elapsed_secs: elapsed.as_secs_f64(),
            per_iteration,
        };
        self.write_summary(&result)?;
        Ok(result)
    }

    fn write_summary(&self, result: &RunResult) -> Result<PathBuf, HarnessError> {
        let path = self.layout.summary_path();
        let write = || -> io::Result<()> {
            fs::create_dir_all(self.layout.output_dir())?;
            let json = serde_json::to_vec_pretty(result)
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
            fs::write(&path, json)
        };
        write().map_err(|source| HarnessError::Summary {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
