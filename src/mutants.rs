use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::operators::MutatorCategory;

/// Identity of a mutation. `ordinal` separates several mutations one
/// operator produces on the same line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutationId {
    pub file_path: Utf8PathBuf,
    pub line: usize,
    pub mutator: String,
    pub ordinal: usize,
}

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}#{}", self.file_path, self.line, self.mutator, self.ordinal)
    }
}

/// A proposed change, before it is written anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub file_path: Utf8PathBuf,
    pub line: usize,
    pub column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub mutator: String,
    pub category: MutatorCategory,
    pub ordinal: usize,
    pub original: String,
    pub replacement: String,
    pub is_covered: bool,
    pub covering_tests: Vec<String>,
}

impl Mutation {
    pub fn id(&self) -> MutationId {
        MutationId {
            file_path: self.file_path.clone(),
            line: self.line,
            mutator: self.mutator.clone(),
            ordinal: self.ordinal,
        }
    }
}

/// A mutation written into its own workspace, ready to be tested.
#[derive(Debug, Clone)]
pub struct Mutant {
    pub mutation: Mutation,
    pub mutated_source: String,
    pub diff: String,
    /// Root of the isolated copy the test runner executes in.
    pub workspace: PathBuf,
    /// The mutated file inside `workspace`.
    pub mutated_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutantStatus {
    Killed,
    Escaped,
    Errored,
    TimedOut,
    Skipped,
}

impl MutantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MutantStatus::Killed => "killed",
            MutantStatus::Escaped => "escaped",
            MutantStatus::Errored => "errored",
            MutantStatus::TimedOut => "timed_out",
            MutantStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRunResult {
    pub mutation: Mutation,
    pub status: MutantStatus,
    pub covering_tests_run: Vec<String>,
    pub exit_code: Option<i32>,
    pub stderr_tail: String,
    pub elapsed: Duration,
    /// Unified diff of the mutant; empty when it was never materialized.
    pub diff: String,
    /// Why the mutant errored, when it did.
    pub error: Option<String>,
}

impl TestRunResult {
    pub fn without_execution(mutation: Mutation, status: MutantStatus, error: Option<String>) -> Self {
        Self {
            mutation,
            status,
            covering_tests_run: vec![],
            exit_code: None,
            stderr_tail: String::new(),
            elapsed: Duration::ZERO,
            diff: String::new(),
            error,
        }
    }
}
