//! `convoy chain` command implementation.

use crate::cli::display::format_path;
use colored::Colorize;
use convoy::app::App;
use convoy::domain::RepoName;
use std::path::Path;

/// Run the chain command.
pub async fn run(
    workspace: &Path,
    source: &str,
    target: &str,
    json: bool,
) -> Result<(), convoy::Error> {
    let app = App::from_directory(workspace).await?;
    let paths = app
        .analyzer()
        .get_dependency_chain(&RepoName::new(source), &RepoName::new(target))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    if paths.is_empty() {
        println!(
            "{} does not depend on {} (directly or transitively).",
            source.bold(),
            target.bold()
        );
        return Ok(());
    }

    println!(
        "{} dependency {} from {} to {}:",
        paths.len(),
        if paths.len() == 1 { "path" } else { "paths" },
        source.bold(),
        target.bold()
    );
    for path in &paths {
        println!("  {}", format_path(path));
    }

    Ok(())
}
