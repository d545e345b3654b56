//! Filtered project copies for mutant workspaces.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "target",
    "dist",
    "build",
    ".next",
    ".nuxt",
    ".mutant-engine-state.json",
];

const SKIP_SUFFIXES: &[&str] = &[".pyc", ".pyo"];

const ROOT_MARKERS: &[&str] = &[
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "package.json",
    "Cargo.toml",
    "go.mod",
    ".git",
];

/// Entries never copied into a workspace nor searched for sources.
pub(crate) fn should_skip(name: &str) -> bool {
    SKIP_NAMES.contains(&name) || SKIP_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Nearest directory at or above `start` holding a project marker, or
/// `start` itself when there is none.
pub fn find_project_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| ROOT_MARKERS.iter().any(|m| dir.join(m).exists()))
        .unwrap_or(start)
        .to_path_buf()
}

/// Copy the regular files of `project_root` into `dest_root`, leaving out
/// VCS metadata, virtualenvs, build output and caches. Symlinks are not
/// followed. Returns the number of files copied.
pub fn copy_project(project_root: &Path, dest_root: &Path) -> io::Result<usize> {
    fs::create_dir_all(dest_root)?;

    // `dest_root` may sit inside the tree being copied.
    let walker = WalkDir::new(project_root).into_iter().filter_entry(|e| {
        e.depth() == 0 || (e.path() != dest_root && !should_skip(&e.file_name().to_string_lossy()))
    });

    let mut copied = 0;
    for entry in walker {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(project_root) else {
            continue;
        };
        let target = dest_root.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    tracing::trace!("copied {} files into {}", copied, dest_root.display());
    Ok(copied)
}
