//! `convoy init` command implementation.

use colored::Colorize;
use convoy::commands::init::init_workspace;
use std::path::Path;

/// Run the init command.
pub async fn run(workspace: &Path) -> Result<(), convoy::Error> {
    let result = init_workspace(workspace).await?;

    println!(
        "{} convoy workspace in {}",
        "Initialized".green().bold(),
        result.convoy_dir.display()
    );
    println!("  config: {}", result.config_file.display());
    println!("  data:   {}", result.dependencies_file.display());
    println!();
    println!(
        "Add dependency records to {} (one JSON object per line).",
        result.dependencies_file.display()
    );

    Ok(())
}
