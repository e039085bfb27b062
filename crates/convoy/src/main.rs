//! Convoy CLI - dependency impact analysis and coordinated change execution.
//!
//! Convoy reads a per-workspace dependency graph and answers who is
//! affected by a change, plans the cross-repository rollout, and executes
//! it phase by phase with rollback on failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use convoy::domain::{ChangeType, RunStatus};
use tracing_subscriber::EnvFilter;

mod cli;

/// Convoy: dependency impact analysis and coordinated changes.
#[derive(Parser)]
#[command(name = "convoy")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Workspace root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a convoy workspace in the current directory
    Init,

    /// Analyze the impact of changing a repository
    Analyze {
        /// Repository being changed
        repo: String,

        /// Category of the change
        #[arg(short, long, value_enum, default_value_t = ChangeType::Feature)]
        change_type: ChangeType,
    },

    /// Detect circular dependencies
    Circular,

    /// Show every dependency path between two repositories
    Chain {
        /// Depending repository
        source: String,

        /// Depended-on repository
        target: String,
    },

    /// Rank repositories by importance
    Importance,

    /// Generate a coordination plan for a change
    Plan {
        /// Repository the change originates in
        primary: String,

        /// Short description of the change
        description: String,

        /// Affected repositories (derived from impact analysis when omitted)
        affected: Vec<String>,

        /// Category of the change (used when deriving the affected set)
        #[arg(short, long, value_enum, default_value_t = ChangeType::Feature)]
        change_type: ChangeType,
    },

    /// Plan and execute a coordinated change
    Execute {
        /// Repository the change originates in
        primary: String,

        /// Short description of the change
        description: String,

        /// Affected repositories (derived from impact analysis when omitted)
        affected: Vec<String>,

        /// Category of the change (used when deriving the affected set)
        #[arg(short, long, value_enum, default_value_t = ChangeType::Feature)]
        change_type: ChangeType,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Determine workspace root
    let workspace = match cli.workspace {
        Some(w) => w,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!(
                    "{}: failed to get current directory: {e}",
                    "error".red().bold()
                );
                return ExitCode::FAILURE;
            }
        },
    };

    let result = match cli.command {
        Commands::Init => cli::init::run(&workspace).await.map(|()| ExitCode::SUCCESS),
        Commands::Analyze { repo, change_type } => {
            cli::analyze::run(&workspace, &repo, change_type, cli.json)
                .await
                .map(|()| ExitCode::SUCCESS)
        }
        Commands::Circular => cli::circular::run(&workspace, cli.json)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Chain { source, target } => {
            cli::chain::run(&workspace, &source, &target, cli.json)
                .await
                .map(|()| ExitCode::SUCCESS)
        }
        Commands::Importance => cli::importance::run(&workspace, cli.json)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Plan {
            primary,
            description,
            affected,
            change_type,
        } => cli::plan::run(
            &workspace,
            &primary,
            &description,
            &affected,
            change_type,
            cli.json,
        )
        .await
        .map(|()| ExitCode::SUCCESS),
        Commands::Execute {
            primary,
            description,
            affected,
            change_type,
        } => cli::execute::run(
            &workspace,
            &primary,
            &description,
            &affected,
            change_type,
            cli.json,
        )
        .await
        .map(|status| {
            if status == RunStatus::Completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {}: {cause}", "caused by".dimmed());
                source = std::error::Error::source(cause);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_parses_repo_and_change_type() {
        let cli = Cli::try_parse_from(["convoy", "analyze", "core-api", "-c", "breaking"]).unwrap();
        match cli.command {
            Commands::Analyze { repo, change_type } => {
                assert_eq!(repo, "core-api");
                assert_eq!(change_type, ChangeType::Breaking);
            }
            _ => panic!("expected analyze command"),
        }
    }

    #[test]
    fn analyze_defaults_to_feature_change() {
        let cli = Cli::try_parse_from(["convoy", "analyze", "core-api"]).unwrap();
        match cli.command {
            Commands::Analyze { change_type, .. } => {
                assert_eq!(change_type, ChangeType::Feature);
            }
            _ => panic!("expected analyze command"),
        }
    }

    #[test]
    fn plan_accepts_trailing_affected_repos() {
        let cli = Cli::try_parse_from([
            "convoy", "plan", "core-api", "bump auth", "web-app", "worker",
        ])
        .unwrap();
        match cli.command {
            Commands::Plan {
                primary,
                description,
                affected,
                ..
            } => {
                assert_eq!(primary, "core-api");
                assert_eq!(description, "bump auth");
                assert_eq!(affected, vec!["web-app", "worker"]);
            }
            _ => panic!("expected plan command"),
        }
    }

    #[test]
    fn global_flags_are_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["convoy", "circular", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn workspace_flag_overrides_current_dir() {
        let cli = Cli::try_parse_from(["convoy", "-w", "/some/dir", "importance"]).unwrap();
        assert_eq!(cli.workspace, Some(PathBuf::from("/some/dir")));
    }

    #[test]
    fn invalid_change_type_is_rejected() {
        let err = Cli::try_parse_from(["convoy", "analyze", "core-api", "-c", "huge"]);
        assert!(err.is_err());
    }
}
