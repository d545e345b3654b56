use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::generator::SourceSelection;
use crate::runner::RunOptions;

pub const CONFIG_FILE_NAME: &str = "mutant-engine.toml";

/// Settings for one run. Read from `mutant-engine.toml` when present,
/// then overridden by command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub project_root: Option<PathBuf>,
    pub source_dirs: Vec<PathBuf>,
    pub excludes: Vec<PathBuf>,
    pub filter: Option<String>,
    pub mutators: Vec<String>,
    pub only_covered: bool,
    pub coverage: Option<PathBuf>,
    pub test_command: String,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub keep_workspaces: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            project_root: None,
            source_dirs: Vec::new(),
            excludes: Vec::new(),
            filter: None,
            mutators: Vec::new(),
            only_covered: false,
            coverage: None,
            test_command: "pytest".to_string(),
            concurrency: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            timeout_secs: 60,
            keep_workspaces: false,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads `mutant-engine.toml` from `dir`, or defaults when absent.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            tracing::debug!("loading config from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout must be at least 1 second".to_string()));
        }
        if self.test_command.trim().is_empty() {
            return Err(ConfigError::Invalid("test command is empty".to_string()));
        }
        if self.only_covered && self.coverage.is_none() {
            return Err(ConfigError::Invalid(
                "only_covered needs a coverage report".to_string(),
            ));
        }
        Ok(())
    }

    pub fn selection(&self) -> SourceSelection {
        SourceSelection {
            source_dirs: self.source_dirs.clone(),
            excludes: self.excludes.clone(),
            filter: self.filter.clone(),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            concurrency: self.concurrency,
            timeout: Duration::from_secs(self.timeout_secs),
            only_covered: self.only_covered,
            keep_workspaces: self.keep_workspaces,
        }
    }
}
