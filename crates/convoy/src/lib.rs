//! # Convoy: dependency impact analysis and coordinated changes
//!
//! Convoy models the dependencies between the repositories of a
//! multi-repository system as a directed graph, analyzes the blast radius
//! of a change, plans the cross-repository rollout in phases, and executes
//! it with rollback on failure.
//!
//! ## Quick Start
//!
//! ```no_run
//! use convoy::app::App;
//! use convoy::domain::{ChangeType, RepoName};
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), convoy::Error> {
//!     let app = App::from_directory(Path::new(".")).await?;
//!
//!     let analysis = app
//!         .analyzer()
//!         .analyze_change_impact(&RepoName::new("core-api"), ChangeType::Breaking)?;
//!     println!(
//!         "{} repositories affected, risk {}",
//!         analysis.affected_count(),
//!         analysis.risk.level
//!     );
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod analysis;
pub mod app;
pub mod commands;
pub mod domain;
pub mod error;
pub mod executor;
pub mod graph;
pub mod plan;
pub mod storage;

// Internal helpers
pub(crate) mod id;

pub use error::{Error, Result};
