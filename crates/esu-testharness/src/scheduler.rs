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
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::coordinator::{TrialExecutor, TrialOutcome};
use crate::error::HarnessError;
use crate::run_log;
use crate::run_log::RunLog;
use crate::trial::TrialId;

/// Default number of simulations allowed to run at once.
pub const DEFAULT_MAX_PARALLEL: usize = 20;

/// Tally of one iteration.
#[derive(Debug, Clone)]
pub struct IterationResult {
    /// Iteration index.
    pub iteration: u32,
    /// Trials submitted, equal to the number of outcomes collected.
    pub submitted: u32,
    /// Trials that did not pass.
    pub failures: u32,
    /// Wall-clock time from first submission to last outcome.
    pub elapsed: Duration,
    /// Every outcome, ordered by process index.
    pub outcomes: Vec<TrialOutcome>,
}

/// Runs the trials of one iteration on a bounded pool.
pub struct IterationScheduler {
    executor: Arc<dyn TrialExecutor>,
    slots: Arc<Semaphore>,
    max_parallel: usize,
    log: Arc<RunLog>,
}

impl std::fmt::Debug for IterationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterationScheduler")
            .field("max_parallel", &self.max_parallel)
            .field("log", &self.log.path())
            .finish()
    }
}

impl IterationScheduler {
    /// Create a scheduler running at most `max_parallel` trials at once
    /// (clamped to at least one).
    pub fn new(executor: Arc<dyn TrialExecutor>, max_parallel: usize, log: Arc<RunLog>) -> Self {
        let max_parallel = max_parallel.max(1);
        Self {
            executor,
            slots: Arc::new(Semaphore::new(max_parallel)),
            max_parallel,
            log,
        }
    }

    /// Concurrency bound of the pool.
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Run trials `(iteration, 0..processes)` and tally failures.
    ///
    /// Every trial is submitted before any outcome is awaited, and this
    /// returns only once every submitted trial has finished. If any trial
    /// hits an infrastructure error the rest of the iteration is still
    /// drained, then the first such error is returned.
    pub async fn run_iteration(
        &self,
        iteration: u32,
        processes: u32,
    ) -> Result<IterationResult, HarnessError> {
        let started = Instant::now();
        let mut trials = JoinSet::new();

        for process in 0..processes {
            let trial = TrialId::new(iteration, process);
            let executor = Arc::clone(&self.executor);
            let slots = Arc::clone(&self.slots);
            trials.spawn(async move {
                let _slot = slots
                    .acquire_owned()
                    .await
                    .map_err(|_| HarnessError::PoolClosed(trial))?;
                executor.execute(trial).await
            });
        }
        debug!(iteration, processes, max_parallel = self.max_parallel, "iteration submitted");

        let mut outcomes = Vec::with_capacity(processes as usize);
        let mut fatal: Option<HarnessError> = None;
        let mut collected = 0u32;
        while let Some(joined) = trials.join_next().await {
            collected += 1;
            let err = match joined {
                Ok(Ok(outcome)) => {
                    outcomes.push(outcome);
                    continue;
                }
                Ok(Err(err)) => err,
                Err(join_err) => HarnessError::TrialAborted(join_err.to_string()),
            };
            error!(iteration, error = %err, "trial failed with an infrastructure error");
            fatal.get_or_insert(err);
        }
        debug_assert_eq!(collected, processes);

        if let Some(err) = fatal {
            run_log!(
                self.log,
                "Iteration {} aborted after collecting {} of {} trials: {}",
                iteration,
                collected,
                processes,
                err
            )?;
            return Err(err);
        }

        outcomes.sort_by_key(|outcome| outcome.trial);
        let failures = outcomes.iter().filter(|outcome| !outcome.passed).count() as u32;
        Ok(IterationResult {
            iteration,
            submitted: processes,
            failures,
            elapsed: started.elapsed(),
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    use crate::verifier::Verdict;

    /// Fails odd process indices; lower indices take longer so completion
    /// order is the reverse of submission order.
    #[derive(Default)]
    struct AlternatingExecutor {
        active: AtomicUsize,
        peak: AtomicUsize,
        executed: Mutex<Vec<TrialId>>,
        fatal_for: Option<TrialId>,
    }

    #[async_trait]
    impl TrialExecutor for AlternatingExecutor {
        async fn execute(&self, trial: TrialId) -> Result<TrialOutcome, HarnessError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = 30 * u64::from(8u32.saturating_sub(trial.process));
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.executed.lock().push(trial);

            if self.fatal_for == Some(trial) {
                return Err(HarnessError::Launch {
                    trial,
                    program: "engine".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }
            let verdict = if trial.process % 2 == 0 {
                Verdict::Win {
                    artifact: "artifact".into(),
                    line: 1,
                }
            } else {
                Verdict::Inconclusive {
                    artifact: "artifact".into(),
                }
            };
            Ok(TrialOutcome::from_verdict(
                trial,
                Duration::from_millis(delay),
                verdict,
            ))
        }
    }

    struct PanickingExecutor;

    #[async_trait]
    impl TrialExecutor for PanickingExecutor {
        async fn execute(&self, trial: TrialId) -> Result<TrialOutcome, HarnessError> {
            if trial.process == 0 {
                panic!("simulated executor bug");
            }
            Ok(TrialOutcome::from_verdict(
                trial,
                Duration::ZERO,
                Verdict::Missing {
                    artifact: "artifact".into(),
                },
            ))
        }
    }

    fn log() -> (TempDir, Arc<RunLog>) {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(RunLog::file_only(dir.path().join("run_output.log")));
        (dir, log)
    }

    #[tokio::test]
    async fn tally_is_exact_regardless_of_completion_order() {
        let (_dir, log) = log();
        let executor = Arc::new(AlternatingExecutor::default());
        let scheduler = IterationScheduler::new(executor.clone(), 20, log);

        let result = scheduler.run_iteration(0, 3).await.unwrap();
        assert_eq!(result.submitted, 3);
        assert_eq!(result.failures, 1);
        assert_eq!(result.outcomes.len(), 3);
        let processes: Vec<_> = result.outcomes.iter().map(|o| o.trial.process).collect();
        assert_eq!(processes, [0, 1, 2]);

        // Slowest trial was submitted first, so it completed last.
        let executed = executor.executed.lock().clone();
        assert_eq!(executed.first(), Some(&TrialId::new(0, 2)));
        assert_eq!(executed.last(), Some(&TrialId::new(0, 0)));
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_bound() {
        let (_dir, log) = log();
        let executor = Arc::new(AlternatingExecutor::default());
        let scheduler = IterationScheduler::new(executor.clone(), 2, log);

        let result = scheduler.run_iteration(3, 8).await.unwrap();
        assert_eq!(result.failures, 4);
        assert!(executor.peak.load(Ordering::SeqCst) <= 2);
        let unique: HashSet<_> = executor.executed.lock().iter().copied().collect();
        assert_eq!(unique.len(), 8);
    }

    #[tokio::test]
    async fn zero_processes_is_an_empty_iteration() {
        let (_dir, log) = log();
        let scheduler = IterationScheduler::new(Arc::new(AlternatingExecutor::default()), 0, log);
        assert_eq!(scheduler.max_parallel(), 1);

        let result = scheduler.run_iteration(0, 0).await.unwrap();
        assert_eq!(result.submitted, 0);
        assert_eq!(result.failures, 0);
    }

    #[tokio::test]
    async fn fatal_trial_error_surfaces_after_draining() {
        let (_dir, log) = log();
        let executor = Arc::new(AlternatingExecutor {
            fatal_for: Some(TrialId::new(1, 1)),
            ..AlternatingExecutor::default()
        });
        let scheduler = IterationScheduler::new(executor.clone(), 20, log.clone());

        let err = scheduler.run_iteration(1, 4).await.unwrap_err();
        assert!(matches!(err, HarnessError::Launch { trial, .. } if trial == TrialId::new(1, 1)));
        assert_eq!(executor.executed.lock().len(), 4);

        let logged = std::fs::read_to_string(log.path()).unwrap();
        assert!(logged.contains("Iteration 1 aborted after collecting 4 of 4 trials"));
    }

    #[tokio::test]
    async fn panicking_trial_is_not_lost() {
        let (_dir, log) = log();
        let scheduler = IterationScheduler::new(Arc::new(PanickingExecutor), 4, log);

        let err = scheduler.run_iteration(0, 3).await.unwrap_err();
        assert!(matches!(err, HarnessError::TrialAborted(_)));
    }
}
