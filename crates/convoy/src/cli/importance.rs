//! `convoy importance` command implementation.

use colored::Colorize;
use convoy::app::App;
use std::path::Path;

/// Run the importance command.
pub async fn run(workspace: &Path, json: bool) -> Result<(), convoy::Error> {
    let app = App::from_directory(workspace).await?;
    let scores = app.analyzer().calculate_repository_importance();

    if json {
        println!("{}", serde_json::to_string_pretty(&scores)?);
        return Ok(());
    }

    if scores.is_empty() {
        println!("{}", "No repositories in the dependency graph.".dimmed());
        return Ok(());
    }

    // Highest first; ties broken by name for stable output.
    let mut ranked: Vec<_> = scores.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));

    println!("{}", "Repository importance:".bold());
    for (i, (repo, score)) in ranked.iter().enumerate() {
        println!("  {:>3}. {:<32} {score:>6.1}", i + 1, repo.to_string());
    }

    Ok(())
}
