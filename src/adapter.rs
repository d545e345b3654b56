//! Boundary to the project's test runner.
//!
//! An adapter knows how to build the runner invocation for a mutant
//! workspace and how to read the runner's verdict back. Spawning, output
//! capture and timeout enforcement live in [`invoke`], shared by every
//! adapter.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Pass,
    Fail,
    Error,
}

/// Runner verdict: per requested test, plus the process exit status.
/// `exit_code` is `None` when the process was terminated by a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResult {
    pub exit_code: Option<i32>,
    pub tests: BTreeMap<String, TestOutcome>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub trait TestRunAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// The runner invocation, restricted to `covering_tests` when non-empty.
    fn build_command(&self, workspace: &Path, covering_tests: &[String]) -> Result<Command, AdapterError>;

    fn parse_result(
        &self,
        workspace: &Path,
        covering_tests: &[String],
        output: &ProcessOutput,
    ) -> Result<RawResult, AdapterError>;
}

#[derive(Debug)]
pub enum Invocation {
    Completed { raw: RawResult, output: ProcessOutput },
    /// The process outlived the timeout and was killed.
    TimedOut { stderr: String },
}

/// Run the adapter's command in `workspace`. On timeout the process (and
/// its process group on unix) is killed and reaped before returning.
///
/// Processes the runner leaves behind in its group are killed once it
/// exits. Output still held open past the timeout budget, e.g. by a daemon
/// that left the group, counts as a timeout.
pub fn invoke(
    adapter: &dyn TestRunAdapter,
    workspace: &Path,
    covering_tests: &[String],
    timeout: Duration,
) -> Result<Invocation, AdapterError> {
    let mut cmd = adapter.build_command(workspace, covering_tests)?;
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let program = cmd.get_program().to_string_lossy().to_string();
    let mut child = cmd.spawn().map_err(|source| AdapterError::Spawn { program, source })?;

    // Drain both pipes so a chatty runner cannot block on a full buffer.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    terminate(&mut child);
                    // Readers may stay blocked on pipes inherited by stray
                    // grandchildren; leave them detached.
                    return Ok(Invocation::TimedOut { stderr: String::new() });
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                terminate(&mut child);
                return Err(AdapterError::Wait(e));
            }
        }
    };
    kill_group(child.id());

    let deadline = start + timeout.max(start.elapsed() + READER_GRACE);
    let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline)) else {
        return Ok(Invocation::TimedOut { stderr: String::new() });
    };

    let output = ProcessOutput {
        exit_code: status.code(),
        success: status.success(),
        stdout,
        stderr,
    };
    let raw = adapter.parse_result(workspace, covering_tests, &output)?;
    Ok(Invocation::Completed { raw, output })
}

/// Minimum wait for the output readers after the runner exits.
const READER_GRACE: Duration = Duration::from_millis(200);

fn drain(mut pipe: impl Read + Send + 'static) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
    });
    rx
}

/// `None` when the pipe is still open at `deadline`; the reader thread is
/// left detached.
fn collect(reader: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(reader) = reader else {
        return Some(String::new());
    };
    match reader.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => Some(text),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

fn terminate(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

/// process_group(0) made the runner its own group leader, so the group id
/// is its pid.
fn kill_group(pgid: u32) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .arg("-KILL")
            .arg("--")
            .arg(format!("-{pgid}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    #[cfg(not(unix))]
    let _ = pgid;
}

/// Runs a shell-style command line. The token `{tests}` expands to the
/// covering test ids, one argument each; without it the ids are appended.
/// `{workspace}` expands to the mutant workspace path.
#[derive(Debug, Clone)]
pub struct CommandAdapter {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

pub const TESTS_TOKEN: &str = "{tests}";
pub const WORKSPACE_TOKEN: &str = "{workspace}";

impl CommandAdapter {
    /// `base_dir` anchors relative program paths such as `.venv/bin/pytest`
    /// so they still resolve from inside a workspace copy.
    pub fn from_command_line(cmd: &str, base_dir: &Path) -> Result<Self, AdapterError> {
        let (program, args) = parse_test_cmd(cmd);
        if program.is_empty() {
            return Err(AdapterError::EmptyCommand);
        }
        Ok(Self {
            program: resolve_program(&program, base_dir),
            args,
            env: vec![
                ("OBJC_DISABLE_INITIALIZE_FORK_SAFETY".to_string(), "YES".to_string()),
                ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
            ],
        })
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args_for(&self, workspace: &Path, covering_tests: &[String]) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + covering_tests.len());
        let mut expanded = false;
        for arg in &self.args {
            if arg == TESTS_TOKEN {
                args.extend(covering_tests.iter().cloned());
                expanded = true;
            } else {
                args.push(arg.replace(WORKSPACE_TOKEN, &workspace.to_string_lossy()));
            }
        }
        if !expanded {
            args.extend(covering_tests.iter().cloned());
        }
        args
    }
}

impl TestRunAdapter for CommandAdapter {
    fn name(&self) -> &str {
        &self.program
    }

    fn build_command(&self, workspace: &Path, covering_tests: &[String]) -> Result<Command, AdapterError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args_for(workspace, covering_tests)).current_dir(workspace);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        Ok(cmd)
    }

    /// The exit code is the only signal: 0 passes every requested test,
    /// anything else fails them all. A failing run whose output shows the
    /// code never compiled or imported is an adapter error instead.
    fn parse_result(
        &self,
        _workspace: &Path,
        covering_tests: &[String],
        output: &ProcessOutput,
    ) -> Result<RawResult, AdapterError> {
        if !output.success {
            if let Some(marker) = unviable_marker(output) {
                return Err(AdapterError::Unviable {
                    marker: marker.to_string(),
                });
            }
        }
        let outcome = if output.success {
            TestOutcome::Pass
        } else {
            TestOutcome::Fail
        };
        Ok(RawResult {
            exit_code: output.exit_code,
            tests: covering_tests.iter().map(|t| (t.clone(), outcome)).collect(),
        })
    }
}

/// Output that means the runner failed before any test could run:
/// interpreter load errors, then compiler diagnostics.
const UNVIABLE_MARKERS: &[&str] = &[
    "SyntaxError",
    "IndentationError",
    "ImportError",
    "ModuleNotFoundError",
    "error[E",
    "could not compile",
    "error TS",
];

fn unviable_marker(output: &ProcessOutput) -> Option<&'static str> {
    UNVIABLE_MARKERS
        .iter()
        .copied()
        .find(|m| output.stderr.contains(m) || output.stdout.contains(m))
}

pub fn parse_test_cmd(cmd: &str) -> (String, Vec<String>) {
    let mut parts = cmd.split_whitespace().map(|s| s.to_string());
    let program = parts.next().unwrap_or_default();
    (program, parts.collect())
}

fn resolve_program(program: &str, base_dir: &Path) -> String {
    let p = Path::new(program);
    if p.is_absolute() || !program.contains('/') {
        // Bare command (e.g. "pytest"): let PATH resolve it.
        return program.to_string();
    }
    let candidate: PathBuf = base_dir.join(p);
    if candidate.exists() {
        candidate.to_string_lossy().to_string()
    } else {
        program.to_string()
    }
}
