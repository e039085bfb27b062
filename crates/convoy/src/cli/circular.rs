//! `convoy circular` command implementation.

use crate::cli::display::format_path;
use colored::Colorize;
use convoy::app::App;
use std::path::Path;

/// Run the circular command.
pub async fn run(workspace: &Path, json: bool) -> Result<(), convoy::Error> {
    let app = App::from_directory(workspace).await?;
    let cycles = app.analyzer().find_circular_dependencies();

    if json {
        println!("{}", serde_json::to_string_pretty(&cycles)?);
        return Ok(());
    }

    if cycles.is_empty() {
        println!("{}", "No circular dependencies detected.".green());
        return Ok(());
    }

    println!(
        "Found {} circular {}:",
        cycles.len().to_string().red().bold(),
        if cycles.len() == 1 {
            "dependency"
        } else {
            "dependencies"
        }
    );
    println!();

    for (i, cycle) in cycles.iter().enumerate() {
        println!("  {} {}:", "Cycle".yellow().bold(), i + 1);
        println!("    {}", format_path(cycle).dimmed());
    }

    Ok(())
}
