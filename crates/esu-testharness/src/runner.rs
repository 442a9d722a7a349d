//! ---
//! esu_section: "02-trial-engine"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Concurrent trial engine: scheduling, verification, and reporting."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use esu_common::config::LaunchConfig;
use esu_common::time::format_elapsed;
use indexmap::IndexMap;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::HarnessError;
use crate::run_log;
use crate::run_log::RunLog;
use crate::trial::{TrialId, TrialLayout};

/// Fixed command line of the simulation, completed per trial with its log tag.
#[derive(Debug, Clone)]
pub struct LaunchTemplate {
    program: PathBuf,
    leading_args: Vec<String>,
    working_dir: PathBuf,
    params: IndexMap<String, String>,
    prepend_key: String,
}

impl LaunchTemplate {
    /// Build a template from launch configuration.
    pub fn from_config(config: &LaunchConfig) -> Self {
        Self {
            program: config.program.clone(),
            leading_args: config.leading_args.clone(),
            working_dir: config.working_dir.clone(),
            params: config.params.clone(),
            prepend_key: config.prepend_key.clone(),
        }
    }

    /// Arguments for one trial: leading arguments, the fixed `key=value`
    /// parameters in order, then the log-prepend parameter.
    pub fn arguments(&self, tag: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(self.leading_args.len() + self.params.len() + 1);
        args.extend(self.leading_args.iter().cloned());
        args.extend(
            self.params
                .iter()
                .map(|(key, value)| format!("{key}={value}")),
        );
        args.push(format!("{}={}", self.prepend_key, tag));
        args
    }

    /// Directory the simulation runs in.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Program to execute. A relative path with a directory component is
    /// taken relative to the working directory and made absolute, so the
    /// child's own directory change cannot apply it a second time. A bare
    /// name is left for `PATH` lookup.
    pub fn program(&self) -> io::Result<PathBuf> {
        let has_dir = self
            .program
            .parent()
            .map(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(false);
        if self.program.is_relative() && has_dir {
            std::path::absolute(self.working_dir.join(&self.program))
        } else {
            Ok(self.program.clone())
        }
    }
}

/// How a trial process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// The process outlived the trial timeout and was killed.
    TimedOut(Duration),
}

/// Record of one simulation process execution.
#[derive(Debug, Clone)]
pub struct TrialRun {
    /// Trial that was executed.
    pub trial: TrialId,
    /// Wall-clock time from launch until the process was reaped.
    pub elapsed: Duration,
    /// How the process ended. The exit code never decides the outcome.
    pub status: RunStatus,
}

/// Launches the simulation for one trial and waits for it.
#[derive(Debug, Clone)]
pub struct TrialRunner {
    template: Arc<LaunchTemplate>,
    layout: Arc<TrialLayout>,
    trial_timeout: Option<Duration>,
    log: Arc<RunLog>,
}

impl TrialRunner {
    /// Create a runner. `trial_timeout` of `None` waits indefinitely.
    pub fn new(
        template: Arc<LaunchTemplate>,
        layout: Arc<TrialLayout>,
        trial_timeout: Option<Duration>,
        log: Arc<RunLog>,
    ) -> Self {
        Self {
            template,
            layout,
            trial_timeout,
            log,
        }
    }

    /// Run the simulation for `trial`, capturing stdout and stderr into fresh
    /// per-trial files. Blocks the calling task until the process exits.
    pub async fn run(&self, trial: TrialId) -> Result<TrialRun, HarnessError> {
        let tag = self.layout.tag(trial);
        run_log!(
            self.log,
            "Running process {} of iteration {} ({})",
            trial.process,
            trial.iteration,
            tag
        )?;

        let stdout = self.capture_file(self.layout.stdout_path(trial))?;
        let stderr = self.capture_file(self.layout.stderr_path(trial))?;

        let program = self
            .template
            .program()
            .map_err(|source| HarnessError::Launch {
                trial,
                program: self.template.program.display().to_string(),
                source,
            })?;
        let args = self.template.arguments(&tag);
        debug!(%trial, program = %program.display(), ?args, "launching simulation");

        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(self.template.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| HarnessError::Launch {
            trial,
            program: program.display().to_string(),
            source,
        })?;

        let status = match self.trial_timeout {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(waited) => RunStatus::Exited(
                    waited.map_err(|source| HarnessError::Wait { trial, source })?,
                ),
                Err(_) => {
                    warn!(%trial, limit_secs = limit.as_secs(), "trial exceeded timeout; killing");
                    child
                        .kill()
                        .await
                        .map_err(|source| HarnessError::Wait { trial, source })?;
                    RunStatus::TimedOut(limit)
                }
            },
            None => RunStatus::Exited(
                child
                    .wait()
                    .await
                    .map_err(|source| HarnessError::Wait { trial, source })?,
            ),
        };
        let elapsed = started.elapsed();

        match status {
            RunStatus::Exited(exit) => run_log!(
                self.log,
                "Process {} finished in {} ({})",
                tag,
                format_elapsed(elapsed),
                exit
            )?,
            RunStatus::TimedOut(limit) => run_log!(
                self.log,
                "Process {} killed after {} (limit {})",
                tag,
                format_elapsed(elapsed),
                format_elapsed(limit)
            )?,
        }

        Ok(TrialRun {
            trial,
            elapsed,
            status,
        })
    }

    fn capture_file(&self, path: PathBuf) -> Result<File, HarnessError> {
        let create = |path: &Path| -> io::Result<File> {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            File::create(path)
        };
        create(&path).map_err(|source| HarnessError::Capture { path, source })
    }
}
