//! Error types for convoy operations.
//!
//! Errors are split along the line the components need:
//!
//! - **`Error`**: hard failures surfaced to the caller: unreadable or
//!   malformed persisted data, invalid arguments, missing configuration.
//! - Step and action failures during coordination are **values**
//!   (`StepResult` / `ActionResult` in the domain model), recorded on the
//!   run and never raised as errors. A failing `git push` is an outcome to
//!   report, not a reason to unwind the orchestrator.

use crate::domain::RepoName;
use thiserror::Error;

/// Result type for convoy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for convoy operations.
#[derive(Debug, Error)]
pub enum Error {
    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted dependency data is unreadable or malformed
    #[error("storage error at line {line}: {message}")]
    Storage {
        /// 1-based line number in the JSONL file
        line: usize,
        /// What was wrong with the record
        message: String,
    },

    /// A repository name was given that the graph has never seen
    #[error("unknown repository: {0}")]
    UnknownRepository(RepoName),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// No `.convoy/` directory found in this directory or any parent
    #[error("not a convoy workspace (run `convoy init` first)")]
    NotInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_display_includes_line() {
        let err = Error::Storage {
            line: 7,
            message: "missing field `source`".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("line 7"));
        assert!(display.contains("missing field `source`"));
    }

    #[test]
    fn unknown_repository_names_the_repo() {
        let err = Error::UnknownRepository(RepoName::new("ghost-service"));
        assert!(err.to_string().contains("ghost-service"));
    }
}
