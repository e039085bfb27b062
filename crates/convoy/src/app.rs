//! Application context for CLI command execution.
//!
//! `App` finds the workspace, loads configuration and the dependency
//! graph, and hands out the analyzer, planner and executor. All state is
//! owned here and passed down; nothing lives in module-level globals.

use crate::analysis::ImpactAnalyzer;
use crate::commands::init::{find_convoy_root, ConvoyConfig, CONFIG_FILE_NAME, CONVOY_DIR_NAME};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::graph::DependencyGraph;
use crate::plan::Planner;
use crate::storage;
use std::path::{Path, PathBuf};

/// Application context for CLI operations.
///
/// Created per invocation from the working directory. The dependency
/// graph is loaded once and read-only for the lifetime of the context.
#[derive(Debug)]
pub struct App {
    graph: DependencyGraph,
    root_dir: PathBuf,
    repos_root: PathBuf,
}

impl App {
    /// Create an `App` from the given working directory.
    ///
    /// Searches up the directory tree for a `.convoy/` directory, loads
    /// its configuration and the dependency data file.
    ///
    /// # Errors
    ///
    /// - `Error::NotInitialized` if no `.convoy/` directory is found
    /// - `Error::Config` if the configuration cannot be parsed
    /// - `Error::Io` / `Error::Storage` if the data file cannot be loaded
    pub async fn from_directory(working_dir: &Path) -> Result<Self> {
        let root_dir = find_convoy_root(working_dir).ok_or(Error::NotInitialized)?;

        let config_path = root_dir.join(CONVOY_DIR_NAME).join(CONFIG_FILE_NAME);
        let config = ConvoyConfig::load(&config_path).await?;

        let data_path = root_dir.join(&config.data_file);
        let edges = storage::load_edges(&data_path).await?;
        let graph = DependencyGraph::from_edges(edges);

        tracing::debug!(
            root = %root_dir.display(),
            repos = graph.repo_count(),
            edges = graph.edge_count(),
            "loaded workspace"
        );

        Ok(Self {
            repos_root: root_dir.join(&config.repos_root),
            graph,
            root_dir,
        })
    }

    /// The loaded dependency graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// The workspace root (the directory containing `.convoy/`).
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// The directory holding one checkout per repository.
    #[must_use]
    pub fn repos_root(&self) -> &Path {
        &self.repos_root
    }

    /// Analyzer over the loaded graph.
    #[must_use]
    pub fn analyzer(&self) -> ImpactAnalyzer<'_> {
        ImpactAnalyzer::new(&self.graph)
    }

    /// Planner over the loaded graph.
    #[must_use]
    pub fn planner(&self) -> Planner<'_> {
        Planner::new(&self.graph, &self.repos_root)
    }

    /// Executor running real shell commands under the repos root.
    #[must_use]
    pub fn executor(&self) -> Executor {
        Executor::with_shell_runner(&self.repos_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init::init_workspace;
    use crate::domain::{DependencyEdge, DependencyType, ImpactLevel, RepoName};
    use tempfile::TempDir;

    fn edge(id: &str, source: &str, target: &str) -> DependencyEdge {
        DependencyEdge {
            id: id.to_string(),
            source: RepoName::new(source),
            target: RepoName::new(target),
            dependency_type: DependencyType::Code,
            version: None,
            impact_level: ImpactLevel::Medium,
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn from_directory_loads_an_initialized_workspace() {
        let temp = TempDir::new().unwrap();
        let init = init_workspace(temp.path()).await.unwrap();

        crate::storage::save_edges(&[edge("e1", "a", "b")], &init.dependencies_file)
            .await
            .unwrap();

        let app = App::from_directory(temp.path()).await.unwrap();
        assert_eq!(app.graph().repo_count(), 2);
        assert_eq!(app.root_dir(), temp.path());
    }

    #[tokio::test]
    async fn from_directory_finds_the_workspace_from_a_subdirectory() {
        let temp = TempDir::new().unwrap();
        init_workspace(temp.path()).await.unwrap();

        let sub = temp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let app = App::from_directory(&sub).await.unwrap();
        assert_eq!(app.root_dir(), temp.path());
    }

    #[tokio::test]
    async fn uninitialized_directory_is_rejected() {
        let temp = TempDir::new().unwrap();

        let err = App::from_directory(temp.path()).await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }
}
