#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn engine_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mutant-engine"))
}

const APP: &str = "\
def add(a, b):
    return a + b


def is_positive(n):
    return n > 0
";

/// A Python project whose \"test suite\" is a shell script, so the run does
/// not depend on a Python toolchain being installed.
fn create_project(dir: &Path, check: &str) {
    std::fs::write(dir.join("pyproject.toml"), "[project]\nname = \"calc\"\n").unwrap();
    std::fs::create_dir_all(dir.join("src")).unwrap();
    std::fs::write(dir.join("src").join("app.py"), APP).unwrap();
    std::fs::write(dir.join("check.sh"), check).unwrap();
}

fn run_engine(dir: &Path, args: &[&str]) -> Output {
    Command::new(engine_bin())
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run mutant-engine")
}

fn json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| {
        panic!(
            "invalid JSON: {e}\nstdout: {stdout}\nstderr: {}",
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

const STRONG_CHECK: &str = "grep -q 'return a + b' src/app.py && grep -q 'return n > 0' src/app.py\n";
const WEAK_CHECK: &str = "grep -q 'return a + b' src/app.py\n";

#[test]
fn strong_suite_kills_everything() {
    let dir = tempfile::TempDir::new().unwrap();
    create_project(dir.path(), STRONG_CHECK);

    let output = run_engine(dir.path(), &["run", "--src", "src", "--test-cmd", "sh check.sh", "-j", "2", "--json"]);
    let report = json(&output);

    assert_eq!(output.status.code(), Some(0));
    let summary = &report["summary"];
    assert!(summary["total"].as_u64().unwrap() > 0);
    assert_eq!(summary["escaped"], 0);
    assert_eq!(summary["killed"], summary["total"]);
    assert_eq!(summary["score"].as_f64().unwrap(), 1.0);
    assert_eq!(
        report["results"].as_array().unwrap().len() as u64,
        summary["total"].as_u64().unwrap()
    );
}

#[test]
fn weak_suite_lets_mutants_escape() {
    let dir = tempfile::TempDir::new().unwrap();
    create_project(dir.path(), WEAK_CHECK);

    let output = run_engine(dir.path(), &["run", "--src", "src", "--test-cmd", "sh check.sh", "--json"]);
    let report = json(&output);

    assert_eq!(output.status.code(), Some(1));
    let escaped = report["summary"]["escaped_mutants"].as_array().unwrap();
    assert!(!escaped.is_empty());
    assert!(escaped.iter().all(|m| m["line"] == 6));
    assert_eq!(escaped[0]["ref_id"], "m1");
}

#[test]
fn mutator_whitelist_limits_the_run() {
    let dir = tempfile::TempDir::new().unwrap();
    create_project(dir.path(), STRONG_CHECK);

    let output = run_engine(
        dir.path(),
        &["run", "--src", "src", "--test-cmd", "sh check.sh", "--mutators", "ARITH", "--json"],
    );
    let report = json(&output);
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["mutation"]["mutator"], "arith");
    assert_eq!(results[0]["status"], "killed");
}

#[test]
fn coverage_gating_skips_unreached_files() {
    let dir = tempfile::TempDir::new().unwrap();
    create_project(dir.path(), STRONG_CHECK);
    std::fs::write(
        dir.path().join("lcov.info"),
        "TN:test_add\nSF:src/app.py\nDA:1,1\nDA:2,1\nDA:6,0\nend_of_record\n",
    )
    .unwrap();

    let output = run_engine(
        dir.path(),
        &[
            "run",
            "--src",
            "src",
            "--test-cmd",
            "sh check.sh",
            "--coverage",
            "lcov.info",
            "--only-covered",
            "--json",
        ],
    );
    let report = json(&output);
    let results = report["results"].as_array().unwrap();
    assert!(!results.is_empty());
    for r in results {
        assert_eq!(r["mutation"]["line"], 2);
        assert_eq!(r["covering_tests_run"][0], "test_add");
    }
}

#[test]
fn config_file_supplies_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    create_project(dir.path(), STRONG_CHECK);
    std::fs::write(
        dir.path().join("mutant-engine.toml"),
        "source_dirs = [\"src\"]\ntest_command = \"sh check.sh\"\nmutators = [\"boundary\"]\n",
    )
    .unwrap();

    let output = run_engine(dir.path(), &["run", "--json"]);
    let report = json(&output);
    assert_eq!(report["summary"]["total"], 1);
    assert_eq!(report["results"][0]["mutation"]["replacement"], ">=");
}

#[test]
fn missing_source_dir_is_a_config_error() {
    let dir = tempfile::TempDir::new().unwrap();
    create_project(dir.path(), STRONG_CHECK);

    let output = run_engine(dir.path(), &["run", "--src", "lib", "--test-cmd", "sh check.sh"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("lib"));
}

#[test]
fn red_suite_aborts_before_mutating() {
    let dir = tempfile::TempDir::new().unwrap();
    create_project(dir.path(), "grep -q 'return a - b' src/app.py\n");

    let output = run_engine(dir.path(), &["run", "--src", "src", "--test-cmd", "sh check.sh", "--json"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unmutated project"));
    assert!(output.stdout.is_empty());
    assert!(!dir.path().join(".mutant-engine-state.json").exists());
}

#[test]
fn unknown_operators_only_is_a_config_error() {
    let dir = tempfile::TempDir::new().unwrap();
    create_project(dir.path(), STRONG_CHECK);

    let output = run_engine(dir.path(), &["run", "--src", "src", "--mutators", "nonsense"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no mutation operators"));
}

#[test]
fn status_reports_the_last_run() {
    let dir = tempfile::TempDir::new().unwrap();
    create_project(dir.path(), WEAK_CHECK);

    let before = run_engine(dir.path(), &["status", "--json"]);
    assert_eq!(before.status.code(), Some(2));

    run_engine(dir.path(), &["run", "--src", "src", "--test-cmd", "sh check.sh", "--json"]);
    assert!(dir.path().join(".mutant-engine-state.json").exists());

    let after = run_engine(dir.path(), &["status", "--json"]);
    assert_eq!(after.status.code(), Some(0));
    let summary = json(&after);
    assert!(summary["escaped"].as_u64().unwrap() > 0);
}

#[test]
fn mutators_lists_the_catalog() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = run_engine(dir.path(), &["mutators", "--json"]);
    let list = json(&output);
    let ids: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 12);
    assert!(ids.contains(&"default_param"));
}
