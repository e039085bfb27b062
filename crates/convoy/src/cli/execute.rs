//! `convoy execute` command implementation.
//!
//! Plans a coordinated change and runs it immediately with the real shell
//! runner. A run that does not complete reports a nonzero exit through the
//! returned status.

use crate::cli::plan::{build_plan, print_plan};
use colored::Colorize;
use convoy::app::App;
use convoy::domain::{ChangeType, RunStatus};
use std::path::Path;

/// Run the execute command. Returns the terminal status of the run.
pub async fn run(
    workspace: &Path,
    primary: &str,
    description: &str,
    affected: &[String],
    change_type: ChangeType,
    json: bool,
) -> Result<RunStatus, convoy::Error> {
    let app = App::from_directory(workspace).await?;
    let plan = build_plan(&app, primary, description, affected, change_type)?;

    if !json {
        print_plan(&plan);
        println!();
        println!("{}", "Executing...".bold());
    }

    let run = app.executor().execute_coordination(&plan).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(run.status);
    }

    println!();
    for line in &run.log {
        println!("  {}", line.dimmed());
    }
    println!();

    match run.status {
        RunStatus::Completed => {
            println!(
                "{} run {} completed ({} phases)",
                "Success:".green().bold(),
                run.id,
                run.completed_phases.len()
            );
        }
        status => {
            println!(
                "{} run {} finished with status {:?}",
                "Failure:".red().bold(),
                run.id,
                status
            );
            for failed in &run.failed_steps {
                println!(
                    "  {} [{}] {}: {}",
                    "✗".red(),
                    failed.repository,
                    failed.step_name,
                    failed.error
                );
            }
        }
    }

    Ok(run.status)
}
