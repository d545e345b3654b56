use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mutants::{MutantStatus, TestRunResult};

pub const STATE_FILE_NAME: &str = ".mutant-engine-state.json";

/// Aggregated outcome of a run, persisted for `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub score: f64,
    pub total: usize,
    pub killed: usize,
    pub escaped: usize,
    pub errored: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub escaped_mutants: Vec<EscapedMutant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapedMutant {
    pub ref_id: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub mutator: String,
    pub original: String,
    pub replacement: String,
    pub diff: String,
}

impl RunSummary {
    /// Timeouts count as detected. Skipped and errored mutants are left
    /// out of the denominator. `elapsed` is the run's wall-clock time.
    pub fn from_results(results: &[TestRunResult], elapsed: Duration) -> Self {
        let count = |status: MutantStatus| results.iter().filter(|r| r.status == status).count();
        let killed = count(MutantStatus::Killed);
        let timed_out = count(MutantStatus::TimedOut);
        let errored = count(MutantStatus::Errored);
        let skipped = count(MutantStatus::Skipped);

        let escaped_mutants: Vec<EscapedMutant> = results
            .iter()
            .filter(|r| r.status == MutantStatus::Escaped)
            .enumerate()
            .map(|(i, r)| {
                let m = &r.mutation;
                EscapedMutant {
                    ref_id: format!("m{}", i + 1),
                    file: m.file_path.to_string(),
                    line: m.line,
                    column: m.column,
                    mutator: m.mutator.clone(),
                    original: m.original.clone(),
                    replacement: m.replacement.clone(),
                    diff: r.diff.clone(),
                }
            })
            .collect();

        let tested = killed + timed_out + escaped_mutants.len();
        let score = if tested > 0 {
            (killed + timed_out) as f64 / tested as f64
        } else {
            1.0
        };

        Self {
            score,
            total: results.len(),
            killed,
            escaped: escaped_mutants.len(),
            errored,
            timed_out,
            skipped,
            duration_ms: elapsed.as_millis() as u64,
            escaped_mutants,
        }
    }
}

pub fn state_path(dir: &Path) -> PathBuf {
    dir.join(STATE_FILE_NAME)
}

pub fn save_to_path(summary: &RunSummary, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string(summary)?;
    std::fs::write(path, json)
}

pub fn load_from_path(path: &Path) -> Option<RunSummary> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}
