//! Concurrent mutant execution.
//!
//! A fixed pool of worker threads pulls mutation indexes from a shared
//! counter. Each worker owns one mutant end to end (materialize, run,
//! classify, clean up) and appends its result to a single locked vector.
//! Results are re-sorted by generation index once the pool drains, so the
//! output order never depends on which worker finished first.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;

use crate::adapter::{self, Invocation, RawResult, TestOutcome, TestRunAdapter};
use crate::error::ConfigError;
use crate::events::{EventBus, MutationEvent};
use crate::materializer::MutantMaterializer;
use crate::mutants::{Mutation, MutantStatus, TestRunResult};

const STDERR_TAIL_BYTES: usize = 2000;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub concurrency: usize,
    pub timeout: Duration,
    /// Mutations on uncovered lines are reported `Skipped` without running.
    pub only_covered: bool,
    pub keep_workspaces: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            timeout: Duration::from_secs(60),
            only_covered: false,
            keep_workspaces: false,
        }
    }
}

pub fn generate_session_id() -> String {
    format!("{:08x}", fastrand::u32(..))
}

/// Run-level temporary root; every mutant gets a subdirectory under it.
pub fn create_workspace_root(session_id: &str) -> std::io::Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("mutant-engine-{session_id}-"))
        .tempdir()
}

/// Runs the whole suite once against an unmutated copy of the project.
/// A red baseline would make every mutant look killed, so it aborts the run.
pub fn run_baseline(
    adapter: &dyn TestRunAdapter,
    materializer: &MutantMaterializer,
    timeout: Duration,
) -> Result<Duration, ConfigError> {
    let start = Instant::now();
    let workspace = materializer
        .prepare_baseline()
        .map_err(|e| ConfigError::BaselineFailed(e.to_string()))?;

    let outcome = adapter::invoke(adapter, &workspace, &[], timeout);
    if let Err(e) = std::fs::remove_dir_all(&workspace) {
        tracing::warn!("failed to remove baseline workspace {}: {}", workspace.display(), e);
    }

    match outcome {
        Ok(Invocation::Completed { output, .. }) if output.success => {
            let elapsed = start.elapsed();
            tracing::info!("baseline suite passed in {:?}", elapsed);
            Ok(elapsed)
        }
        Ok(Invocation::Completed { output, .. }) => {
            let detail = if output.stderr.trim().is_empty() {
                &output.stdout
            } else {
                &output.stderr
            };
            Err(ConfigError::BaselineFailed(format!(
                "exit code {:?}\n{}",
                output.exit_code,
                tail(detail, STDERR_TAIL_BYTES).trim_end()
            )))
        }
        Ok(Invocation::TimedOut { .. }) => Err(ConfigError::BaselineFailed(format!("timed out after {timeout:?}"))),
        Err(e) => Err(ConfigError::BaselineFailed(e.to_string())),
    }
}

pub struct ExecutionEngine<'a> {
    adapter: &'a dyn TestRunAdapter,
    materializer: &'a MutantMaterializer,
    events: &'a EventBus,
    options: RunOptions,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(
        adapter: &'a dyn TestRunAdapter,
        materializer: &'a MutantMaterializer,
        events: &'a EventBus,
        options: RunOptions,
    ) -> Self {
        Self {
            adapter,
            materializer,
            events,
            options,
        }
    }

    /// One result per mutation, in the order of `mutations`.
    pub fn run(&self, mutations: &[Mutation], sources: &BTreeMap<Utf8PathBuf, String>) -> Vec<TestRunResult> {
        let workers = self.options.concurrency.max(1).min(mutations.len().max(1));
        let next = AtomicUsize::new(0);
        let collected: Mutex<Vec<(usize, TestRunResult)>> = Mutex::new(Vec::with_capacity(mutations.len()));

        tracing::info!(
            "running {} mutants on {} workers (timeout {:?})",
            mutations.len(),
            workers,
            self.options.timeout
        );

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(mutation) = mutations.get(index) else {
                            break;
                        };
                        let result = self.execute(index, mutation, sources);
                        collected
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .push((index, result));
                    }
                });
            }
        });

        let mut collected = collected.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        collected.sort_by_key(|(index, _)| *index);
        collected.into_iter().map(|(_, result)| result).collect()
    }

    fn execute(&self, index: usize, mutation: &Mutation, sources: &BTreeMap<Utf8PathBuf, String>) -> TestRunResult {
        let id = mutation.id().to_string();

        if self.options.only_covered && !mutation.is_covered {
            let result = TestRunResult::without_execution(mutation.clone(), MutantStatus::Skipped, None);
            self.finish(index, id, &result);
            return result;
        }

        self.events.publish(MutationEvent::MutantStarted { index, id: id.clone() });
        let start = Instant::now();

        let Some(original) = sources.get(&mutation.file_path) else {
            let result = TestRunResult::without_execution(
                mutation.clone(),
                MutantStatus::Errored,
                Some(format!("original source of {} is unavailable", mutation.file_path)),
            );
            self.finish(index, id, &result);
            return result;
        };

        let mutant = match self.materializer.materialize(index, mutation, original) {
            Ok(mutant) => mutant,
            Err(e) => {
                tracing::warn!("{}: failed to materialize: {}", id, e);
                let mut result =
                    TestRunResult::without_execution(mutation.clone(), MutantStatus::Errored, Some(e.to_string()));
                result.elapsed = start.elapsed();
                self.finish(index, id, &result);
                return result;
            }
        };

        let tests = &mutation.covering_tests;
        let (status, exit_code, stderr, error) =
            match adapter::invoke(self.adapter, &mutant.workspace, tests, self.options.timeout) {
                Ok(Invocation::Completed { raw, output }) => {
                    (classify(&raw), output.exit_code, output.stderr, None)
                }
                Ok(Invocation::TimedOut { stderr }) => (MutantStatus::TimedOut, None, stderr, None),
                Err(e) => {
                    tracing::warn!("{}: test runner failed: {}", id, e);
                    (MutantStatus::Errored, None, String::new(), Some(e.to_string()))
                }
            };

        if !self.options.keep_workspaces {
            self.materializer.discard(&mutant);
        }

        let result = TestRunResult {
            mutation: mutation.clone(),
            status,
            covering_tests_run: tests.clone(),
            exit_code,
            stderr_tail: tail(&stderr, STDERR_TAIL_BYTES).to_string(),
            elapsed: start.elapsed(),
            diff: mutant.diff,
            error,
        };
        self.finish(index, id, &result);
        result
    }

    fn finish(&self, index: usize, id: String, result: &TestRunResult) {
        tracing::debug!("{} = {} in {:?}", id, result.status.as_str(), result.elapsed);
        self.events.publish(MutationEvent::MutantFinished {
            index,
            id,
            status: result.status,
        });
    }
}

/// Any failing or erroring test kills the mutant. A process that died
/// from a signal tells us nothing about the tests.
pub fn classify(raw: &RawResult) -> MutantStatus {
    let Some(code) = raw.exit_code else {
        return MutantStatus::Errored;
    };
    if raw
        .tests
        .values()
        .any(|o| matches!(o, TestOutcome::Fail | TestOutcome::Error))
    {
        return MutantStatus::Killed;
    }
    if raw.tests.is_empty() && code != 0 {
        return MutantStatus::Killed;
    }
    MutantStatus::Escaped
}

fn tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
