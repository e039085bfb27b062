//! Common display utilities for CLI commands.

use colored::{ColoredString, Colorize};
use convoy::domain::{ImpactLevel, RepoName, RiskLevel};

const MAX_DISPLAY_ITEMS: usize = 10;

/// Color an impact level for terminal output.
pub fn impact_colored(level: ImpactLevel) -> ColoredString {
    let text = level.to_string();
    match level {
        ImpactLevel::Low => text.dimmed(),
        ImpactLevel::Medium => text.yellow(),
        ImpactLevel::High => text.red(),
        ImpactLevel::Critical => text.red().bold(),
    }
}

/// Color a risk level for terminal output.
pub fn risk_colored(level: RiskLevel) -> ColoredString {
    let text = level.to_string();
    match level {
        RiskLevel::Low => text.green(),
        RiskLevel::Medium => text.yellow(),
        RiskLevel::High => text.red().bold(),
    }
}

/// Render a repository path as `a → b → c`.
pub fn format_path(path: &[RepoName]) -> String {
    path.iter()
        .map(RepoName::as_str)
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Print a bulleted list with truncation past `MAX_DISPLAY_ITEMS`.
pub fn print_list(items: &[String], empty_message: &str) {
    if items.is_empty() {
        println!("    {}", empty_message.dimmed());
        return;
    }

    for item in items.iter().take(MAX_DISPLAY_ITEMS) {
        println!("    {} {item}", "•".dimmed());
    }

    if items.len() > MAX_DISPLAY_ITEMS {
        println!(
            "    {} ... and {} more",
            "•".dimmed(),
            items.len() - MAX_DISPLAY_ITEMS
        );
    }
}
