use std::path::PathBuf;

use thiserror::Error;

/// A source file could not be turned into a syntax tree. The file is
/// skipped; the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("failed to load {0} grammar: {1}")]
    Grammar(&'static str, String),

    #[error("parser produced no tree")]
    NoTree,

    #[error("malformed source: syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
}

/// A mutation could not be turned into a runnable mutant. Recorded as
/// `Errored` for that mutation only.
#[derive(Error, Debug)]
pub enum MaterializationError {
    #[error("span {start}..{end} is outside the source ({len} bytes)")]
    SpanOutOfRange { start: usize, end: usize, len: usize },

    #[error("span {start}..{end} does not fall on character boundaries")]
    SpanNotOnBoundary { start: usize, end: usize },

    #[error("source at {start}..{end} no longer matches the recorded fragment")]
    FragmentMismatch { start: usize, end: usize },

    #[error("failed to prepare workspace {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The test runner could not be invoked or its report could not be read.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("empty test command")]
    EmptyCommand,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting on test process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("unreadable test report: {0}")]
    Report(String),

    /// The mutated code never reached the tests.
    #[error("mutant does not build or import ({marker})")]
    Unviable { marker: String },
}

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// Run-level failure. Raised before any worker starts; nothing is generated.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("source directory does not exist: {}", .0.display())]
    MissingSourceDir(PathBuf),

    #[error("no source files found under {}", format_dirs(.0))]
    NoSourceFiles(Vec<PathBuf>),

    #[error("no mutation operators are active (whitelist: {0:?})")]
    NoOperators(Vec<String>),

    #[error("invalid file filter {pattern:?}: {message}")]
    InvalidFilter { pattern: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to load coverage report: {0}")]
    Coverage(#[from] CoverageError),

    #[error("failed to create workspace root: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("test suite does not pass on the unmutated project: {0}")]
    BaselineFailed(String),
}

fn format_dirs(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
