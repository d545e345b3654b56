use std::fs;

use camino::Utf8PathBuf;
use mutant_engine::error::MaterializationError;
use mutant_engine::materializer::{self, MutantMaterializer};
use mutant_engine::mutants::Mutation;
use mutant_engine::operators::MutatorCategory;
use tempfile::TempDir;

const SOURCE: &str = "def add(a, b):\n    return a + b\n";

fn make_mutation(start: usize, end: usize, original: &str, replacement: &str) -> Mutation {
    Mutation {
        file_path: Utf8PathBuf::from("pkg/calc.py"),
        line: 2,
        column: start + 1,
        start_byte: start,
        end_byte: end,
        mutator: "arith".to_string(),
        category: MutatorCategory::Body,
        ordinal: 0,
        original: original.to_string(),
        replacement: replacement.to_string(),
        is_covered: true,
        covering_tests: vec!["test_add".to_string()],
    }
}

fn plus() -> Mutation {
    let start = SOURCE.find('+').unwrap();
    make_mutation(start, start + 1, "+", "-")
}

// --- apply_mutation ---

#[test]
fn apply_mutation_replaces_span() {
    let mutated = materializer::apply_mutation(SOURCE, &plus()).unwrap();
    assert_eq!(mutated, "def add(a, b):\n    return a - b\n");
}

#[test]
fn apply_mutation_longer_replacement() {
    let start = SOURCE.find("return").unwrap();
    let mutation = make_mutation(start, SOURCE.len() - 1, "return a + b", "return None");
    let mutated = materializer::apply_mutation(SOURCE, &mutation).unwrap();
    assert_eq!(mutated, "def add(a, b):\n    return None\n");
}

#[test]
fn apply_mutation_rejects_out_of_range_span() {
    let mutation = make_mutation(10, 500, "x", "y");
    let err = materializer::apply_mutation(SOURCE, &mutation).unwrap_err();
    assert!(matches!(err, MaterializationError::SpanOutOfRange { len, .. } if len == SOURCE.len()));
}

#[test]
fn apply_mutation_rejects_stale_fragment() {
    let start = SOURCE.find('+').unwrap();
    let mutation = make_mutation(start, start + 1, "*", "/");
    let err = materializer::apply_mutation(SOURCE, &mutation).unwrap_err();
    assert!(matches!(err, MaterializationError::FragmentMismatch { .. }));
}

#[test]
fn apply_mutation_rejects_split_characters() {
    let mutation = make_mutation(0, 1, "é", "e");
    let err = materializer::apply_mutation("é = 1\n", &mutation).unwrap_err();
    assert!(matches!(err, MaterializationError::SpanNotOnBoundary { .. }));
}

// --- diff ---

#[test]
fn diff_is_unified_with_headers() {
    let mutated = materializer::apply_mutation(SOURCE, &plus()).unwrap();
    let diff = materializer::generate_diff("pkg/calc.py", SOURCE, &mutated);
    assert!(diff.contains("--- a/pkg/calc.py"), "{diff}");
    assert!(diff.contains("+++ b/pkg/calc.py"), "{diff}");
    assert!(diff.contains("-    return a + b"), "{diff}");
    assert!(diff.contains("+    return a - b"), "{diff}");
    assert!(diff.contains(" def add(a, b):"), "{diff}");
}

#[test]
fn identical_sources_have_empty_diff() {
    assert!(materializer::generate_diff("x.py", SOURCE, SOURCE).is_empty());
}

// --- workspaces ---

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("pkg")).unwrap();
    fs::write(dir.path().join("pkg").join("calc.py"), SOURCE).unwrap();
    fs::write(dir.path().join("test_calc.py"), "from pkg.calc import add\n").unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    dir
}

#[test]
fn materialize_writes_an_isolated_copy() {
    let project = project();
    let workspaces = TempDir::new().unwrap();
    let materializer = MutantMaterializer::new(project.path(), workspaces.path());

    let mutant = materializer.materialize(3, &plus(), SOURCE).unwrap();
    assert_eq!(mutant.workspace, workspaces.path().join("mutant-00003"));
    assert_eq!(mutant.mutated_file, mutant.workspace.join("pkg").join("calc.py"));
    assert_eq!(fs::read_to_string(&mutant.mutated_file).unwrap(), mutant.mutated_source);
    assert!(mutant.mutated_source.contains("a - b"));
    assert!(mutant.workspace.join("test_calc.py").exists());
    assert!(!mutant.workspace.join(".git").exists());
    assert!(!mutant.diff.is_empty());

    // The project itself is never touched.
    assert_eq!(fs::read_to_string(project.path().join("pkg").join("calc.py")).unwrap(), SOURCE);

    materializer.discard(&mutant);
    assert!(!mutant.workspace.exists());
}

#[test]
fn workspaces_do_not_share_files() {
    let project = project();
    let workspaces = TempDir::new().unwrap();
    let materializer = MutantMaterializer::new(project.path(), workspaces.path());

    let start = SOURCE.find("return").unwrap();
    let other = make_mutation(start, SOURCE.len() - 1, "return a + b", "return None");
    let first = materializer.materialize(0, &plus(), SOURCE).unwrap();
    let second = materializer.materialize(1, &other, SOURCE).unwrap();

    assert_ne!(first.workspace, second.workspace);
    assert!(fs::read_to_string(&first.mutated_file).unwrap().contains("a - b"));
    assert!(fs::read_to_string(&second.mutated_file).unwrap().contains("return None"));
}

#[test]
fn materialize_without_project_copy_writes_only_the_mutated_file() {
    let project = project();
    let workspaces = TempDir::new().unwrap();
    let materializer = MutantMaterializer::new(project.path(), workspaces.path()).copy_project(false);

    let mutant = materializer.materialize(0, &plus(), SOURCE).unwrap();
    assert!(mutant.mutated_file.exists());
    assert!(!mutant.workspace.join("test_calc.py").exists());
}

#[test]
fn materialize_replaces_a_stale_workspace() {
    let project = project();
    let workspaces = TempDir::new().unwrap();
    let materializer = MutantMaterializer::new(project.path(), workspaces.path());

    let stale = materializer.workspace_for(0);
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("leftover.txt"), "old").unwrap();

    let mutant = materializer.materialize(0, &plus(), SOURCE).unwrap();
    assert!(!mutant.workspace.join("leftover.txt").exists());
}

#[test]
fn failed_splice_creates_no_workspace() {
    let project = project();
    let workspaces = TempDir::new().unwrap();
    let materializer = MutantMaterializer::new(project.path(), workspaces.path());

    let bad = make_mutation(0, 3, "xyz", "abc");
    assert!(materializer.materialize(7, &bad, SOURCE).is_err());
    assert!(!materializer.workspace_for(7).exists());
}
