//! Implementation of the `init` command.
//!
//! Creates the `.convoy/` workspace directory with a configuration file
//! and an empty dependency data file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the convoy directory
pub const CONVOY_DIR_NAME: &str = ".convoy";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the dependency data file
pub const DEPENDENCIES_FILE_NAME: &str = "dependencies.jsonl";

/// Default directory holding the repository checkouts, relative to the
/// workspace root
pub const DEFAULT_REPOS_ROOT: &str = ".";

/// Maximum directory depth to traverse when searching for the convoy root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Configuration file structure for convoy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConvoyConfig {
    /// Path to the dependency data file, relative to the workspace root
    #[serde(rename = "data-file")]
    pub data_file: String,

    /// Directory holding one checkout per repository, relative to the
    /// workspace root
    #[serde(rename = "repos-root")]
    pub repos_root: String,
}

impl ConvoyConfig {
    /// Load configuration from a file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }
}

impl Default for ConvoyConfig {
    fn default() -> Self {
        Self {
            data_file: format!("{CONVOY_DIR_NAME}/{DEPENDENCIES_FILE_NAME}"),
            repos_root: DEFAULT_REPOS_ROOT.to_string(),
        }
    }
}

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created convoy directory
    pub convoy_dir: PathBuf,

    /// Path to the created config file
    pub config_file: PathBuf,

    /// Path to the created dependency data file
    pub dependencies_file: PathBuf,
}

/// Initialize a convoy workspace in the given directory.
///
/// Creates `.convoy/` with a default `config.yaml` and an empty
/// `dependencies.jsonl`.
///
/// # Errors
///
/// Returns `Error::Config` if the directory is already initialized, or an
/// I/O error if the files cannot be created.
pub async fn init_workspace(target_dir: &Path) -> Result<InitResult> {
    let convoy_dir = target_dir.join(CONVOY_DIR_NAME);
    if convoy_dir.exists() {
        return Err(Error::Config(format!(
            "already initialized: {} exists",
            convoy_dir.display()
        )));
    }

    fs::create_dir_all(&convoy_dir).await?;

    let config_file = convoy_dir.join(CONFIG_FILE_NAME);
    ConvoyConfig::default().save(&config_file).await?;

    let dependencies_file = convoy_dir.join(DEPENDENCIES_FILE_NAME);
    fs::write(&dependencies_file, "").await?;

    tracing::info!(dir = %convoy_dir.display(), "initialized convoy workspace");

    Ok(InitResult {
        convoy_dir,
        config_file,
        dependencies_file,
    })
}

/// Search up the directory tree for a directory containing `.convoy/`.
#[must_use]
pub fn find_convoy_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(CONVOY_DIR_NAME).exists() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
