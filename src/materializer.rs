use std::fs;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use crate::copy_tree;
use crate::error::MaterializationError;
use crate::mutants::{Mutant, Mutation};

/// Writes mutants into per-mutant directories under a shared root.
pub struct MutantMaterializer {
    project_root: PathBuf,
    workspace_root: PathBuf,
    copy_project: bool,
}

impl MutantMaterializer {
    pub fn new(project_root: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            workspace_root: workspace_root.into(),
            copy_project: true,
        }
    }

    /// When false only the mutated file is written, without the rest of
    /// the project around it.
    pub fn copy_project(mut self, copy: bool) -> Self {
        self.copy_project = copy;
        self
    }

    pub fn workspace_for(&self, index: usize) -> PathBuf {
        self.workspace_root.join(format!("mutant-{index:05}"))
    }

    /// Unmutated copy of the project for the baseline run.
    pub fn prepare_baseline(&self) -> Result<PathBuf, MaterializationError> {
        let workspace = self.workspace_root.join("baseline");
        if workspace.exists() {
            fs::remove_dir_all(&workspace).map_err(io_err(&workspace))?;
        }
        copy_tree::copy_project(&self.project_root, &workspace).map_err(io_err(&workspace))?;
        Ok(workspace)
    }

    pub fn materialize(&self, index: usize, mutation: &Mutation, original: &str) -> Result<Mutant, MaterializationError> {
        let mutated_source = apply_mutation(original, mutation)?;
        let diff = generate_diff(mutation.file_path.as_str(), original, &mutated_source);

        let workspace = self.workspace_for(index);

        if workspace.exists() {
            fs::remove_dir_all(&workspace).map_err(io_err(&workspace))?;
        }
        if self.copy_project {
            copy_tree::copy_project(&self.project_root, &workspace).map_err(io_err(&workspace))?;
        }

        let mutated_file = workspace.join(mutation.file_path.as_std_path());
        if let Some(parent) = mutated_file.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(&mutated_file, &mutated_source).map_err(io_err(&mutated_file))?;

        Ok(Mutant {
            mutation: mutation.clone(),
            mutated_source,
            diff,
            workspace,
            mutated_file,
        })
    }

    pub fn discard(&self, mutant: &Mutant) {
        if let Err(e) = fs::remove_dir_all(&mutant.workspace) {
            tracing::warn!("failed to remove workspace {}: {}", mutant.workspace.display(), e);
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> MaterializationError {
    let path = path.to_path_buf();
    move |source| MaterializationError::Workspace { path, source }
}

/// Splice the replacement into `source`. The recorded span must still hold
/// the recorded original fragment.
pub fn apply_mutation(source: &str, mutation: &Mutation) -> Result<String, MaterializationError> {
    let (start, end) = (mutation.start_byte, mutation.end_byte);
    if start > end || end > source.len() {
        return Err(MaterializationError::SpanOutOfRange {
            start,
            end,
            len: source.len(),
        });
    }
    if !source.is_char_boundary(start) || !source.is_char_boundary(end) {
        return Err(MaterializationError::SpanNotOnBoundary { start, end });
    }
    if source[start..end] != mutation.original {
        return Err(MaterializationError::FragmentMismatch { start, end });
    }

    let mut result = String::with_capacity(source.len() + mutation.replacement.len());
    result.push_str(&source[..start]);
    result.push_str(&mutation.replacement);
    result.push_str(&source[end..]);
    Ok(result)
}

/// Unified line diff with three lines of context.
pub fn generate_diff(path: &str, original: &str, mutated: &str) -> String {
    TextDiff::from_lines(original, mutated)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}
