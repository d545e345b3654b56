//! Source discovery and per-file mutation generation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use walkdir::WalkDir;

use crate::collector::MutationCollector;
use crate::copy_tree;
use crate::coverage::CoverageIndex;
use crate::error::ConfigError;
use crate::events::{EventBus, MutationEvent};
use crate::mutants::Mutation;
use crate::operators::Mutator;
use crate::syntax::SyntaxTreeBuilder;
use crate::{Language, detect_language};

#[derive(Debug, Clone, Default)]
pub struct SourceSelection {
    /// Directories to search, relative to the project root or absolute.
    pub source_dirs: Vec<PathBuf>,
    /// Paths (relative to the project root or to a source dir) to leave out.
    pub excludes: Vec<PathBuf>,
    /// Glob matched against file names. `None` keeps every supported file.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the project root; used in mutation ids and coverage lookups.
    pub relative: Utf8PathBuf,
    pub language: Language,
}

pub fn discover_sources(project_root: &Path, selection: &SourceSelection) -> Result<Vec<SourceFile>, ConfigError> {
    let pattern = match selection.filter.as_deref().filter(|f| !f.is_empty()) {
        Some(filter) => Some(glob::Pattern::new(filter).map_err(|e| ConfigError::InvalidFilter {
            pattern: filter.to_string(),
            message: e.to_string(),
        })?),
        None => None,
    };

    let dirs: Vec<PathBuf> = if selection.source_dirs.is_empty() {
        vec![project_root.to_path_buf()]
    } else {
        selection.source_dirs.iter().map(|d| project_root.join(d)).collect()
    };

    let mut files = Vec::new();
    for dir in &dirs {
        if !dir.is_dir() {
            return Err(ConfigError::MissingSourceDir(dir.clone()));
        }

        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !copy_tree::should_skip(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry under {}: {}", dir.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(language) = detect_language(path) else {
                continue;
            };
            if let Some(pattern) = &pattern {
                let name = entry.file_name().to_string_lossy();
                if !pattern.matches(&name) {
                    continue;
                }
            }

            let relative = path.strip_prefix(project_root).unwrap_or(path);
            let in_dir = path.strip_prefix(dir).unwrap_or(path);
            if selection
                .excludes
                .iter()
                .any(|ex| relative.starts_with(ex) || in_dir.starts_with(ex))
            {
                continue;
            }

            let Ok(relative) = Utf8PathBuf::from_path_buf(relative.to_path_buf()) else {
                tracing::warn!("skipping non UTF-8 path {}", path.display());
                continue;
            };
            files.push(SourceFile {
                path: path.to_path_buf(),
                relative,
                language,
            });
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    files.dedup_by(|a, b| a.relative == b.relative);

    if files.is_empty() {
        return Err(ConfigError::NoSourceFiles(dirs));
    }
    Ok(files)
}

/// Everything generation produced. `sources` holds the text each mutation
/// was computed against, keyed by relative path.
#[derive(Debug, Default)]
pub struct Generated {
    pub mutations: Vec<Mutation>,
    pub sources: BTreeMap<Utf8PathBuf, String>,
    pub skipped: Vec<(Utf8PathBuf, String)>,
}

pub struct MutationsGenerator<'a> {
    operators: Vec<&'a dyn Mutator>,
    coverage: &'a CoverageIndex,
    events: &'a EventBus,
}

impl<'a> MutationsGenerator<'a> {
    pub fn new(operators: Vec<&'a dyn Mutator>, coverage: &'a CoverageIndex, events: &'a EventBus) -> Self {
        Self {
            operators,
            coverage,
            events,
        }
    }

    pub fn generate(&self, files: &[SourceFile], only_covered: bool) -> Generated {
        let mut out = Generated::default();
        let collector = MutationCollector::new(&self.operators, self.coverage, only_covered);

        self.events.publish(MutationEvent::GenerationStarted {
            file_count: files.len(),
        });

        for file in files {
            // Files no test touches cannot produce a killable mutant.
            if only_covered && !self.coverage.has_tests(&file.relative) {
                self.events.publish(MutationEvent::FileProcessed {
                    file: file.relative.clone(),
                    mutations: 0,
                });
                continue;
            }

            let source = match std::fs::read_to_string(&file.path) {
                Ok(s) => s,
                Err(e) => {
                    self.skip(&mut out, file, format!("unreadable: {e}"));
                    continue;
                }
            };
            let tree = match SyntaxTreeBuilder::new(file.language).build(&source) {
                Ok(tree) => tree,
                Err(e) => {
                    self.skip(&mut out, file, e.to_string());
                    continue;
                }
            };

            let mutations = collector.collect(&file.relative, &tree);
            tracing::debug!("{}: {} mutations", file.relative, mutations.len());
            self.events.publish(MutationEvent::FileProcessed {
                file: file.relative.clone(),
                mutations: mutations.len(),
            });
            if !mutations.is_empty() {
                out.sources.insert(file.relative.clone(), source);
            }
            out.mutations.extend(mutations);
        }

        self.events.publish(MutationEvent::GenerationFinished {
            mutation_count: out.mutations.len(),
        });
        out
    }

    fn skip(&self, out: &mut Generated, file: &SourceFile, reason: String) {
        tracing::warn!("skipping {}: {}", file.relative, reason);
        self.events.publish(MutationEvent::FileSkipped {
            file: file.relative.clone(),
            reason: reason.clone(),
        });
        self.events.publish(MutationEvent::FileProcessed {
            file: file.relative.clone(),
            mutations: 0,
        });
        out.skipped.push((file.relative.clone(), reason));
    }
}
