//! Coordination plan execution.
//!
//! Runs the phases of a [`CoordinationPlan`] as shell commands, one working
//! directory per repository under the configured repos root. Step and
//! action failures are captured as values on the run record; only the run
//! boundary decides the terminal status. Every run is finalized exactly
//! once: terminal status plus finish timestamp, on the success, failure and
//! internal-error paths alike.
//!
//! Command execution goes through the [`CommandRunner`] trait so tests can
//! script outcomes without spawning processes.

use crate::domain::{
    Action, ActionResult, CoordinationPlan, CoordinationRun, FailedStep, Phase, RunStatus,
    StepResult,
};
use crate::id;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

/// Captured output of one shell command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, absent if the process was killed by a signal
    pub exit_code: Option<i32>,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Object-safe seam for running shell commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` with `cwd` as the working directory.
    ///
    /// A non-zero exit is an `Ok` with the exit code captured; `Err` means
    /// the command could not be launched at all.
    async fn run(&self, command: &str, cwd: &Path) -> std::io::Result<CommandOutput>;
}

/// Runs commands through `sh -c` with captured output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, cwd: &Path) -> std::io::Result<CommandOutput> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .output()
            .await?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

struct RunEntry {
    record: CoordinationRun,
    abort: Option<AbortHandle>,
}

/// Executes coordination plans and tracks their runs.
///
/// The run registry lives behind a shared mutex so background runs started
/// with [`Executor::start_coordination`] stay inspectable and cancellable
/// from the owning context. Cloning the executor shares the registry.
#[derive(Clone)]
pub struct Executor {
    runner: Arc<dyn CommandRunner>,
    repos_root: PathBuf,
    runs: Arc<Mutex<HashMap<String, RunEntry>>>,
}

impl Executor {
    /// Create an executor with the given runner.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, repos_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            repos_root: repos_root.into(),
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create an executor running real shell commands.
    #[must_use]
    pub fn with_shell_runner(repos_root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(ShellRunner), repos_root)
    }

    /// Execute a plan to completion and return the finished run record.
    ///
    /// Phases run in order. A phase failure stops execution, rolls back the
    /// phases reached so far and finalizes the run as `RolledBack`; full
    /// success finalizes as `Completed`.
    pub async fn execute_coordination(&self, plan: &CoordinationPlan) -> CoordinationRun {
        let run_id = id::generate("run", &plan.id);
        self.register(new_run(run_id.clone(), plan), None).await;
        self.execute_run(run_id, plan).await
    }

    /// Start a plan as a background run and return its run id.
    ///
    /// The run is tracked in the registry immediately; progress and the
    /// terminal status land there as the task advances.
    pub async fn start_coordination(&self, plan: CoordinationPlan) -> String {
        let run_id = id::generate("run", &plan.id);
        self.register(new_run(run_id.clone(), &plan), None).await;

        let executor = self.clone();
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            executor.execute_run(task_run_id, &plan).await;
        });

        if let Some(entry) = self.runs.lock().await.get_mut(&run_id) {
            entry.abort = Some(handle.abort_handle());
        }

        // Watch for the task dying without finalizing its run. A panic is
        // an internal error and marks the run Failed; an abort was already
        // finalized as Cancelled by cancel_coordination.
        let watcher = self.clone();
        let watched_id = run_id.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    watcher
                        .fail_run(&watched_id, format!("internal error: {e}"))
                        .await;
                }
            }
        });

        run_id
    }

    /// Mark a run as failed with an internal error, unless it already
    /// reached a terminal status.
    async fn fail_run(&self, run_id: &str, error: String) {
        let mut runs = self.runs.lock().await;
        if let Some(entry) = runs.get_mut(run_id) {
            if !entry.record.status.is_terminal() {
                entry.record.error = Some(error);
                finalize(&mut entry.record, RunStatus::Failed);
                tracing::error!(run_id, "coordination run failed internally");
            }
        }
    }

    /// Cancel a background run.
    ///
    /// Aborts the task and marks the run `Cancelled`. Cancellation does not
    /// trigger rollback; commands already issued are left as they are.
    /// Returns false if the run id is unknown or the run already finished.
    pub async fn cancel_coordination(&self, run_id: &str) -> bool {
        let mut runs = self.runs.lock().await;
        let Some(entry) = runs.get_mut(run_id) else {
            return false;
        };
        if entry.record.status.is_terminal() {
            return false;
        }

        if let Some(abort) = entry.abort.take() {
            abort.abort();
        }
        entry.record.log.push("run cancelled".to_string());
        finalize(&mut entry.record, RunStatus::Cancelled);
        tracing::info!(run_id, "coordination run cancelled");
        true
    }

    /// Look up a run record by id.
    pub async fn run(&self, run_id: &str) -> Option<CoordinationRun> {
        self.runs
            .lock()
            .await
            .get(run_id)
            .map(|entry| entry.record.clone())
    }

    /// All run records, newest first.
    pub async fn runs(&self) -> Vec<CoordinationRun> {
        let mut records: Vec<CoordinationRun> = self
            .runs
            .lock()
            .await
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }

    /// Execute all steps of an action in its repository directory.
    ///
    /// Steps run in order; the first non-zero exit or launch failure stops
    /// the action and marks it failed. Output is captured per step.
    pub async fn execute_action(&self, action: &Action) -> ActionResult {
        let cwd = self.repos_root.join(action.repository.as_str());
        let mut steps = Vec::new();
        let mut success = true;

        for step in &action.steps {
            tracing::debug!(
                repository = %action.repository,
                step = %step.name,
                command = %step.command,
                "running step"
            );

            let result = match self.runner.run(&step.command, &cwd).await {
                Ok(output) => StepResult {
                    step_name: step.name.clone(),
                    command: step.command.clone(),
                    exit_code: output.exit_code,
                    success: output.success(),
                    stdout: output.stdout,
                    stderr: output.stderr,
                },
                Err(e) => StepResult {
                    step_name: step.name.clone(),
                    command: step.command.clone(),
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    success: false,
                },
            };

            let failed = !result.success;
            steps.push(result);
            if failed {
                success = false;
                break;
            }
        }

        ActionResult {
            repository: action.repository.clone(),
            steps,
            success,
        }
    }

    async fn execute_run(&self, run_id: String, plan: &CoordinationPlan) -> CoordinationRun {
        let mut run = new_run(run_id, plan);
        run.status = RunStatus::InProgress;
        run.log.push(format!("executing plan {}", plan.id));
        self.store(&run).await;

        match self.run_phases(plan, &mut run).await {
            None => {
                run.log.push("all phases completed".to_string());
                finalize(&mut run, RunStatus::Completed);
            }
            Some(failed_phase) => {
                run.log.push(format!(
                    "phase {failed_phase} failed, rolling back {} completed phase(s)",
                    run.completed_phases.len()
                ));
                self.run_rollback(plan, failed_phase, &mut run).await;
                finalize(&mut run, RunStatus::RolledBack);
            }
        }

        self.store(&run).await;
        tracing::info!(run_id = %run.id, status = ?run.status, "coordination run finished");
        run
    }

    /// Run execution phases in order. Returns the failed phase number, or
    /// `None` if every phase completed.
    async fn run_phases(&self, plan: &CoordinationPlan, run: &mut CoordinationRun) -> Option<usize> {
        for phase in &plan.execution_phases {
            run.log.push(format!(
                "phase {} started ({} repositories{})",
                phase.phase_number,
                phase.repositories.len(),
                if phase.is_parallel { ", parallel" } else { "" }
            ));

            let results = self.execute_phase(phase).await;
            let mut phase_failed = false;
            for result in &results {
                record_action(run, result);
                if !result.success {
                    phase_failed = true;
                }
            }

            if phase_failed {
                return Some(phase.phase_number);
            }

            run.completed_phases.push(phase.phase_number);
            run.log.push(format!("phase {} completed", phase.phase_number));
            self.store(run).await;
        }
        None
    }

    /// Run one phase: concurrently when parallel, otherwise in order with a
    /// short-circuit at the first failed action.
    async fn execute_phase(&self, phase: &Phase) -> Vec<ActionResult> {
        if phase.is_parallel {
            join_all(phase.actions.iter().map(|a| self.execute_action(a))).await
        } else {
            let mut results = Vec::new();
            for action in &phase.actions {
                let result = self.execute_action(action).await;
                let failed = !result.success;
                results.push(result);
                if failed {
                    break;
                }
            }
            results
        }
    }

    /// Execute the rollback plan truncated to the phases actually reached.
    ///
    /// Rollback phases are already in reverse execution order; entries for
    /// phases beyond the failed one never started and are skipped. Rollback
    /// step failures are recorded but do not stop the remaining rollback.
    async fn run_rollback(
        &self,
        plan: &CoordinationPlan,
        failed_phase: usize,
        run: &mut CoordinationRun,
    ) {
        for phase in &plan.rollback_plan {
            if phase.phase_number > failed_phase {
                continue;
            }
            run.log.push(format!("rolling back phase {}", phase.phase_number));
            let results = self.execute_phase(phase).await;
            for result in &results {
                record_action(run, result);
            }
        }
    }

    async fn register(&self, record: CoordinationRun, abort: Option<AbortHandle>) {
        self.runs
            .lock()
            .await
            .insert(record.id.clone(), RunEntry { record, abort });
    }

    /// Store a snapshot of the run, unless the registry already holds a
    /// terminal record for it (a concurrent cancel wins).
    async fn store(&self, run: &CoordinationRun) {
        let mut runs = self.runs.lock().await;
        match runs.get_mut(&run.id) {
            Some(entry) if entry.record.status.is_terminal() => {}
            Some(entry) => entry.record = run.clone(),
            None => {
                runs.insert(
                    run.id.clone(),
                    RunEntry {
                        record: run.clone(),
                        abort: None,
                    },
                );
            }
        }
    }
}

fn new_run(run_id: String, plan: &CoordinationPlan) -> CoordinationRun {
    CoordinationRun {
        id: run_id,
        plan_id: plan.id.clone(),
        status: RunStatus::Planning,
        completed_phases: Vec::new(),
        failed_steps: Vec::new(),
        log: Vec::new(),
        error: None,
        started_at: Utc::now(),
        finished_at: None,
    }
}

/// Set the terminal status and finish timestamp, exactly once.
fn finalize(run: &mut CoordinationRun, status: RunStatus) {
    if run.finished_at.is_some() {
        return;
    }
    run.status = status;
    run.finished_at = Some(Utc::now());
}

/// Record an action's step outcomes on the run log and failed-step list.
fn record_action(run: &mut CoordinationRun, result: &ActionResult) {
    for step in &result.steps {
        run.log.push(format!(
            "[{}] {} {}",
            result.repository,
            step.step_name,
            if step.success { "ok" } else { "failed" }
        ));
        if !step.success {
            run.failed_steps.push(FailedStep {
                repository: result.repository.clone(),
                step_name: step.step_name.clone(),
                error: describe_failure(step),
            });
        }
    }
}

fn describe_failure(step: &StepResult) -> String {
    match step.exit_code {
        Some(code) => format!("exit code {code}: {}", step.stderr.trim()),
        None => format!("failed to launch: {}", step.stderr.trim()),
    }
}
