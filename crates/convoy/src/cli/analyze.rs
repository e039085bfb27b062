//! `convoy analyze` command implementation.

use crate::cli::display::{format_path, impact_colored, print_list, risk_colored};
use colored::Colorize;
use convoy::app::App;
use convoy::domain::{ChangeType, ImpactEntry, RepoName};
use std::path::Path;

/// Run the analyze command.
pub async fn run(
    workspace: &Path,
    repo: &str,
    change_type: ChangeType,
    json: bool,
) -> Result<(), convoy::Error> {
    let app = App::from_directory(workspace).await?;
    let analysis = app
        .analyzer()
        .analyze_change_impact(&RepoName::new(repo), change_type)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!(
        "Impact of a {} change to {}:",
        change_type.to_string().bold(),
        analysis.changed_repository.to_string().white().bold()
    );
    println!();

    println!("  {} ({}):", "Direct impact".bold(), analysis.direct_impact.len());
    print_entries(&analysis.direct_impact);
    println!();

    println!(
        "  {} ({}):",
        "Transitive impact".bold(),
        analysis.transitive_impact.len()
    );
    print_entries(&analysis.transitive_impact);
    println!();

    println!(
        "  {}: {} (score {})",
        "Risk".bold(),
        risk_colored(analysis.risk.level),
        analysis.risk.score
    );
    for factor in &analysis.risk.factors {
        println!("    {} {factor}", "•".dimmed());
    }
    println!();

    println!("  {}:", "Recommendations".bold());
    print_list(&analysis.recommendations, "none");
    println!();

    println!("  {}:", "Mitigation priority".bold());
    for (i, item) in analysis.risk.mitigation_priority.iter().enumerate() {
        println!("    {}. {item}", i + 1);
    }

    Ok(())
}

fn print_entries(entries: &[ImpactEntry]) {
    if entries.is_empty() {
        println!("    {}", "none".dimmed());
        return;
    }
    for entry in entries {
        println!(
            "    {} {} [{}] via {}",
            "•".dimmed(),
            entry.repository,
            impact_colored(entry.impact_level),
            format_path(&entry.path).dimmed()
        );
    }
}
