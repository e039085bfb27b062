//! JSONL persistence for dependency edge records.
//!
//! The dependency graph is persisted as a JSON Lines file: one
//! [`DependencyEdge`] per line. Loading is a single strict bulk operation.
//! Unlike an issue database, a dependency edge set with a malformed row is
//! not safe to analyze partially, so a bad line fails the whole load with
//! the offending line number instead of being skipped with a warning.

use crate::domain::DependencyEdge;
use crate::error::{Error, Result};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

/// Load all dependency edges from a JSONL file.
///
/// Blank lines are ignored. Any unparseable line (including one missing a
/// required field) fails the load with `Error::Storage` carrying the
/// 1-based line number.
///
/// # Errors
///
/// - `Error::Io` if the file cannot be opened or read
/// - `Error::Storage` if a line is not a valid edge record
pub async fn load_edges(path: &Path) -> Result<Vec<DependencyEdge>> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut edges = Vec::new();
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let edge: DependencyEdge =
            serde_json::from_str(trimmed).map_err(|e| Error::Storage {
                line: line_number,
                message: e.to_string(),
            })?;
        edges.push(edge);
    }

    tracing::debug!(
        count = edges.len(),
        path = %path.display(),
        "loaded dependency edges"
    );

    Ok(edges)
}

/// Write dependency edges to a JSONL file with an atomic write-then-rename.
///
/// Used by `convoy init` to seed the data file and by callers that maintain
/// the edge set externally. If the process is interrupted, the original
/// file is left unchanged.
pub async fn save_edges(edges: &[DependencyEdge], path: &Path) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let file = File::create(&temp_path).await?;
    let mut writer = BufWriter::new(file);

    for edge in edges {
        let json = serde_json::to_string(edge)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    writer.flush().await?;
    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}
