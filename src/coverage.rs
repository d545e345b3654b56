//! Per-line record of which tests execute which source lines.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::CoverageError;

/// Test name used for LCOV records that carry no `TN:` line.
pub const UNNAMED_TEST: &str = "<unnamed>";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageIndex {
    files: BTreeMap<Utf8PathBuf, BTreeMap<usize, BTreeSet<String>>>,
}

impl CoverageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: impl Into<Utf8PathBuf>, line: usize, test: impl Into<String>) {
        self.files
            .entry(normalize(file.into()))
            .or_default()
            .entry(line)
            .or_default()
            .insert(test.into());
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    fn lines_for(&self, file: &Utf8Path) -> Option<&BTreeMap<usize, BTreeSet<String>>> {
        let file = normalize(file.to_path_buf());
        if let Some(lines) = self.files.get(&file) {
            return Some(lines);
        }
        // Reports often record absolute paths while sources are relative.
        // Only an unambiguous absolute match counts.
        if file.is_absolute() {
            return None;
        }
        let mut matches = self
            .files
            .iter()
            .filter(|(key, _)| key.is_absolute() && key.ends_with(&file));
        match (matches.next(), matches.next()) {
            (Some((_, lines)), None) => Some(lines),
            _ => None,
        }
    }

    /// Tests covering `line` of `file`, sorted; empty when uncovered.
    pub fn tests_for(&self, file: &Utf8Path, line: usize) -> Vec<String> {
        self.lines_for(file)
            .and_then(|lines| lines.get(&line))
            .map(|tests| tests.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_covered(&self, file: &Utf8Path, line: usize) -> bool {
        self.lines_for(file)
            .and_then(|lines| lines.get(&line))
            .is_some_and(|tests| !tests.is_empty())
    }

    pub fn has_tests(&self, file: &Utf8Path) -> bool {
        self.lines_for(file)
            .is_some_and(|lines| lines.values().any(|tests| !tests.is_empty()))
    }

    /// Picks the format from the extension: `.json`, anything else is LCOV.
    pub fn load(path: &Path) -> Result<Self, CoverageError> {
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_lcov(&content),
        }
    }

    /// `{ "<file>": { "<line>": ["test", ...] } }`
    pub fn from_json(content: &str) -> Result<Self, CoverageError> {
        let raw: HashMap<String, HashMap<String, Vec<String>>> = serde_json::from_str(content)?;
        let mut index = Self::new();
        for (file, lines) in raw {
            for (line, tests) in lines {
                let line_number: usize = line.parse().map_err(|_| CoverageError::Malformed {
                    line: 0,
                    message: format!("invalid line number {line:?} for {file}"),
                })?;
                for test in tests {
                    index.insert(file.as_str(), line_number, test);
                }
            }
        }
        Ok(index)
    }

    /// LCOV tracefile. `TN:` names the test for the records that follow,
    /// `DA:<line>,<hits>` with hits > 0 marks the line as covered by it.
    pub fn from_lcov(content: &str) -> Result<Self, CoverageError> {
        let mut index = Self::new();
        let mut test_name = UNNAMED_TEST.to_string();
        let mut current_file: Option<Utf8PathBuf> = None;

        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            let lineno = i + 1;

            if let Some(name) = line.strip_prefix("TN:") {
                let name = name.trim();
                test_name = if name.is_empty() {
                    UNNAMED_TEST.to_string()
                } else {
                    name.to_string()
                };
            } else if let Some(path) = line.strip_prefix("SF:") {
                current_file = Some(Utf8PathBuf::from(path.trim()));
            } else if let Some(data) = line.strip_prefix("DA:") {
                let Some(file) = current_file.as_ref() else {
                    return Err(CoverageError::Malformed {
                        line: lineno,
                        message: "DA record outside of a source file".to_string(),
                    });
                };
                let mut parts = data.split(',');
                let line_number: usize = parts
                    .next()
                    .and_then(|p| p.trim().parse().ok())
                    .ok_or_else(|| CoverageError::Malformed {
                        line: lineno,
                        message: "invalid line number".to_string(),
                    })?;
                let hits: u64 = parts
                    .next()
                    .and_then(|p| p.trim().parse().ok())
                    .ok_or_else(|| CoverageError::Malformed {
                        line: lineno,
                        message: "invalid hit count".to_string(),
                    })?;
                if hits > 0 {
                    index.insert(file.clone(), line_number, test_name.clone());
                }
            } else if line == "end_of_record" {
                current_file = None;
            }
        }

        Ok(index)
    }
}

fn normalize(path: Utf8PathBuf) -> Utf8PathBuf {
    match path.strip_prefix("./") {
        Ok(stripped) => stripped.to_path_buf(),
        Err(_) => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_leading_dot() {
        assert_eq!(normalize("./src/app.py".into()), Utf8PathBuf::from("src/app.py"));
        assert_eq!(normalize("src/app.py".into()), Utf8PathBuf::from("src/app.py"));
    }

    #[test]
    fn suffix_lookup_matches_absolute_report_paths() {
        let mut index = CoverageIndex::new();
        index.insert("/home/ci/project/src/app.py", 3, "test_a");
        assert_eq!(index.tests_for(Utf8Path::new("src/app.py"), 3), vec!["test_a"]);
        assert!(!index.is_covered(Utf8Path::new("src/other.py"), 3));
    }

    #[test]
    fn relative_report_key_does_not_cover_other_directories() {
        let mut index = CoverageIndex::new();
        index.insert("app.py", 3, "test_top_level_app");
        assert!(index.tests_for(Utf8Path::new("vendor/other/app.py"), 3).is_empty());
        assert!(!index.has_tests(Utf8Path::new("vendor/other/app.py")));
        assert_eq!(index.tests_for(Utf8Path::new("app.py"), 3), vec!["test_top_level_app"]);
    }

    #[test]
    fn ambiguous_suffix_match_is_uncovered() {
        let mut index = CoverageIndex::new();
        index.insert("/ci/a/src/app.py", 3, "test_a");
        index.insert("/ci/b/src/app.py", 3, "test_b");
        assert!(!index.is_covered(Utf8Path::new("src/app.py"), 3));
        assert_eq!(index.tests_for(Utf8Path::new("/ci/a/src/app.py"), 3), vec!["test_a"]);
    }
}
